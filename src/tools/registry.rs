//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / parameters_schema / execute），
//! 由 ToolRegistry 按名注册与校验；内置工具与动态发现工具共用同一命名空间，
//! 名字冲突时内置优先。

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::core::{AgentError, ToolCall};

/// 工具 trait：名称、描述（供 LLM 理解）、参数 schema、异步执行（args 为 JSON）
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（用于 JSON 中的 "tool" 字段）
    fn name(&self) -> &str;

    /// 工具描述（供 LLM 理解功能）
    fn description(&self) -> &str;

    /// 参数 JSON Schema（供 LLM 生成正确的参数格式）
    /// 默认返回空对象，表示无参数或参数格式不限
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    /// 执行工具
    async fn execute(&self, args: Value) -> Result<String, String>;
}

/// 工具注册表：按名称存储 Arc<dyn Tool>，内置名单用于冲突仲裁
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    builtin_names: HashSet<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册内置工具（启动期调用）
    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.name().to_string();
        self.builtin_names.insert(name.clone());
        self.tools.insert(name, Arc::new(tool));
    }

    /// 注册动态发现的工具；与内置工具重名时跳过（内置优先）
    pub fn register_dynamic(&mut self, tool: impl Tool + 'static) {
        let name = tool.name().to_string();
        if self.builtin_names.contains(&name) {
            tracing::warn!(tool = %name, "dynamic tool shadows builtin, skipped");
            return;
        }
        self.tools.insert(name, Arc::new(tool));
    }

    /// 校验一次 ToolCall：名字已注册则返回句柄，否则 UnknownTool
    pub fn validate(&self, call: &ToolCall) -> Result<Arc<dyn Tool>, AgentError> {
        self.tools
            .get(&call.tool)
            .cloned()
            .ok_or_else(|| AgentError::UnknownTool(call.tool.clone()))
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// 返回 (name, description) 列表，用于生成 prompt 中的 Available tools 段落
    pub fn tool_descriptions(&self) -> Vec<(String, String)> {
        let mut out: Vec<(String, String)> = self
            .tools
            .iter()
            .map(|(name, tool)| (name.clone(), tool.description().to_string()))
            .collect();
        out.sort();
        out
    }

    /// 按实际注册的工具生成 schema JSON（含各工具的参数 schema），拼入 system prompt
    pub fn to_schema_json(&self) -> String {
        let mut entries: Vec<(&String, &Arc<dyn Tool>)> = self.tools.iter().collect();
        entries.sort_by_key(|(name, _)| name.clone());
        let tools: Vec<serde_json::Value> = entries
            .into_iter()
            .map(|(name, tool)| {
                serde_json::json!({
                    "name": name,
                    "description": tool.description(),
                    "parameters": tool.parameters_schema()
                })
            })
            .collect();
        serde_json::to_string_pretty(&tools).unwrap_or_else(|_| "[]".to_string())
    }
}
