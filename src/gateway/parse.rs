//! 模型响应解码
//!
//! 严格的 decode-with-validation：原始文本要么解出 ToolCall，要么是终止性
//! 自由文本（隐式 finish），要么是 MalformedResponse 错误。不做子串分支。

use crate::core::{AgentError, ToolCall};

/// 解码后的下一步动作
#[derive(Debug, Clone)]
pub enum Action {
    /// 模型请求执行一个工具（未经注册表校验）
    ToolCall(ToolCall),
    /// 模型直接给出终止性文本（视为隐式 finish_task）
    TerminalText(String),
}

/// 解码模型原始输出：
/// 提取 ```json 围栏或最外层大括号内的 JSON 并解析为 ToolCall；
/// 无 JSON 迹象则整体视为 TerminalText；JSON 存在但解析失败则 MalformedResponse。
pub fn decode_action(raw: &str) -> Result<Action, AgentError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AgentError::MalformedResponse("empty response".to_string()));
    }

    let json_str = if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        rest.find("```")
            .map(|end| rest[..end].trim())
            .unwrap_or_else(|| rest.trim())
    } else if let Some(start) = trimmed.find('{') {
        match trimmed.rfind('}') {
            Some(end) if end > start => &trimmed[start..=end],
            _ => {
                return Err(AgentError::MalformedResponse(snippet(trimmed)));
            }
        }
    } else {
        return Ok(Action::TerminalText(trimmed.to_string()));
    };

    let parsed: ToolCall = serde_json::from_str(json_str)
        .map_err(|e| AgentError::MalformedResponse(format!("{}: {}", e, snippet(json_str))))?;

    if parsed.tool.is_empty() {
        // 合法 JSON 但没有工具名：按终止文本处理
        Ok(Action::TerminalText(trimmed.to_string()))
    } else {
        Ok(Action::ToolCall(parsed))
    }
}

fn snippet(s: &str) -> String {
    if s.len() > 160 {
        format!("{}...", s.chars().take(160).collect::<String>())
    } else {
        s.to_string()
    }
}
