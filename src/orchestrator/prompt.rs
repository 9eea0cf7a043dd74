//! 系统提示词组装
//!
//! 可用工具清单 + 工具调用 JSON Schema + 各工具参数 Schema + 任务目标，拼为任务的首条 user 轮次；
//! 检索到的记忆由编排器在每步前以独立的上下文轮次注入。

use crate::memory::MemoryRecord;
use crate::tools::{tool_call_schema_json, ToolRegistry};

/// 组装任务开场提示：角色说明、工具清单、响应格式、目标
pub fn build_system_prompt(registry: &ToolRegistry, objective: &str) -> String {
    let tools_block: String = registry
        .tool_descriptions()
        .into_iter()
        .map(|(name, desc)| format!("- {}: {}", name, desc))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are an autonomous task-execution agent with long-term memory.\n\
        \n\
        AVAILABLE TOOLS:\n{tools}\n\
        \n\
        INSTRUCTIONS:\n\
        1. Work towards the task one tool call at a time.\n\
        2. To call a tool, respond with EXACTLY one JSON object and nothing else:\n\
        {{\"tool\": \"tool_name\", \"args\": {{\"param\": \"value\"}}}}\n\
        3. Call finish_task with a summary message when the task is done.\n\
        4. Call request_more_steps if you are running out of step budget.\n\
        \n\
        TOOL CALL SCHEMA:\n{schema}\n\
        \n\
        TOOL PARAMETER SCHEMAS:\n{tool_schemas}\n\
        \n\
        Task: {objective}",
        tools = tools_block,
        schema = tool_call_schema_json(),
        tool_schemas = registry.to_schema_json(),
        objective = objective
    )
}

/// 将检索到的记忆渲染为上下文轮次文本；空结果返回 None
pub fn render_memory_context(records: &[MemoryRecord]) -> Option<String> {
    if records.is_empty() {
        return None;
    }
    let lines: Vec<String> = records.iter().map(|r| format!("- {}", r.text)).collect();
    Some(format!(
        "[memory] Relevant memories from previous tasks:\n{}",
        lines.join("\n")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::GetCurrentDatetimeTool;
    use std::collections::HashMap;

    #[test]
    fn test_prompt_lists_tools_and_objective() {
        let mut registry = ToolRegistry::new();
        registry.register(GetCurrentDatetimeTool);
        let prompt = build_system_prompt(&registry, "tell me the time");
        assert!(prompt.contains("get_current_datetime"));
        assert!(prompt.contains("Task: tell me the time"));
        assert!(prompt.contains("\"tool\""));
    }

    #[test]
    fn test_prompt_carries_per_tool_parameter_schemas() {
        let mut registry = ToolRegistry::new();
        registry.register(crate::tools::FinishTaskTool);
        let prompt = build_system_prompt(&registry, "anything");
        // 参数 schema 来自实际注册的工具，而非通用线格式
        assert!(prompt.contains("\"name\": \"finish_task\""));
        assert!(prompt.contains("Final summary"));
    }

    #[test]
    fn test_memory_context_empty_is_none() {
        assert!(render_memory_context(&[]).is_none());
    }

    #[test]
    fn test_memory_context_lists_records() {
        let records = vec![crate::memory::MemoryRecord {
            text: "previously wrote hello.txt".to_string(),
            metadata: HashMap::new(),
            created_at: chrono::Utc::now(),
        }];
        let block = render_memory_context(&records).unwrap();
        assert!(block.contains("hello.txt"));
        assert!(block.starts_with("[memory]"));
    }
}
