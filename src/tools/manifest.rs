//! 动态工具发现
//!
//! 扫描指定目录下的 *.toml 清单，每个清单描述一个「程序 + 参数模板」工具：
//! name / description / program / args 模板 / 参数声明。发现只在启动期（或显式
//! reload）发生一次，产物与内置工具同命名空间注册，重名时内置优先。
//!
//! 参数模板中 {{workspace}} 替换为沙箱根路径，{{key}} 从 LLM 传入的 args 中取 key；
//! 执行时无 shell，直接 exec program + substituted args，带超时。

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio::process::Command;

use crate::tools::Tool;

/// 清单中的单个参数声明（用于生成 JSON Schema）
#[derive(Debug, Clone, Deserialize)]
pub struct ParamDecl {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required: bool,
}

/// 一个工具清单文件的内容
#[derive(Debug, Clone, Deserialize)]
pub struct ToolManifest {
    pub name: String,
    pub description: String,
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub params: Vec<ParamDecl>,
}

/// 从清单构建的动态工具
pub struct ManifestTool {
    manifest: ToolManifest,
    workspace: PathBuf,
    timeout_secs: u64,
}

impl ManifestTool {
    pub fn new(manifest: ToolManifest, workspace: &Path, timeout_secs: u64) -> Self {
        Self {
            manifest,
            workspace: workspace.to_path_buf(),
            timeout_secs,
        }
    }

    /// 替换模板中的 {{workspace}} 和 {{key}}；args 为 LLM 传入的 JSON 对象
    fn substitute(&self, args: &Value) -> Vec<String> {
        let workspace_str = self.workspace.to_string_lossy();
        let empty = serde_json::Map::new();
        let obj = args.as_object().unwrap_or(&empty);
        self.manifest
            .args
            .iter()
            .map(|tpl| {
                let mut s = tpl.clone();
                s = s.replace("{{workspace}}", &workspace_str);
                for (k, v) in obj {
                    let placeholder = format!("{{{{{}}}}}", k);
                    let val: String = match v {
                        Value::String(x) => x.clone(),
                        _ => v.to_string(),
                    };
                    s = s.replace(&placeholder, &val);
                }
                s
            })
            .collect()
    }
}

#[async_trait]
impl Tool for ManifestTool {
    fn name(&self) -> &str {
        &self.manifest.name
    }

    fn description(&self) -> &str {
        &self.manifest.description
    }

    fn parameters_schema(&self) -> Value {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();
        for p in &self.manifest.params {
            properties.insert(
                p.name.clone(),
                serde_json::json!({ "type": "string", "description": p.description }),
            );
            if p.required {
                required.push(Value::String(p.name.clone()));
            }
        }
        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let args_vec = self.substitute(&args);
        tracing::info!(tool = %self.manifest.name, program = %self.manifest.program, "manifest tool invoke");
        let child = Command::new(&self.manifest.program)
            .args(&args_vec)
            .current_dir(&self.workspace)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| format!("spawn failed: {}", e))?;
        let timeout = Duration::from_secs(self.timeout_secs);
        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| format!("timeout after {}s", self.timeout_secs))?
            .map_err(|e| format!("wait failed: {}", e))?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            return Err(format!(
                "exit {:?}: stderr {}",
                output.status.code(),
                stderr.trim()
            ));
        }
        Ok(stdout.trim().to_string())
    }
}

/// 扫描目录下所有 *.toml 清单；单个清单解析失败只记日志，不影响其它清单
pub fn discover_tools(dir: &Path, workspace: &Path, timeout_secs: u64) -> Vec<ManifestTool> {
    let mut tools = Vec::new();
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            tracing::debug!(dir = %dir.display(), error = %e, "tool dir not readable, skipping discovery");
            return tools;
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("toml") {
            continue;
        }
        let data = match std::fs::read_to_string(&path) {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "manifest read failed");
                continue;
            }
        };
        match toml::from_str::<ToolManifest>(&data) {
            Ok(manifest) => {
                tracing::info!(tool = %manifest.name, path = %path.display(), "dynamic tool discovered");
                tools.push(ManifestTool::new(manifest, workspace, timeout_secs));
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "manifest parse failed");
            }
        }
    }
    tools
}
