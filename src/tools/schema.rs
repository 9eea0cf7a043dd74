//! 工具调用线格式 Schema（schemars 生成）
//!
//! 只描述网关解码的通用 `{"tool", "args"}` 外形；各工具自身的参数 Schema
//! 由 ToolRegistry::to_schema_json 按实际注册的工具聚合，两者一起拼入 system prompt。

use schemars::{schema_for, JsonSchema};
use std::collections::HashMap;

/// 工具调用请求格式：与网关解码的 `{"tool": "...", "args": {...}}` 一致（仅用于 Schema 生成）
#[allow(dead_code)]
#[derive(JsonSchema)]
struct ToolCallFormat {
    /// 工具名，如 write_file、read_file、run_shell_command
    pub tool: String,
    /// 工具参数，依工具不同而不同（path、content、command 等）
    pub args: HashMap<String, String>,
}

/// 返回工具调用的 JSON Schema 字符串，可拼入 system prompt
pub fn tool_call_schema_json() -> String {
    let schema = schema_for!(ToolCallFormat);
    serde_json::to_string_pretty(&schema).unwrap_or_else(|_| String::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_mentions_fields() {
        let schema = tool_call_schema_json();
        assert!(schema.contains("tool"));
        assert!(schema.contains("args"));
    }
}
