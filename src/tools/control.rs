//! 控制流工具
//!
//! finish_task / request_more_steps / return_text 本身只回显参数，
//! 真正的控制流变化（完成任务、增加步数预算）由编排器按工具名特判。

use async_trait::async_trait;
use serde_json::Value;

use crate::tools::Tool;

/// finish_task：声明任务完成，message 参数作为最终摘要
#[derive(Debug, Default)]
pub struct FinishTaskTool;

/// 从 finish_task 的参数中取摘要文本（message 或 summary 键）
pub fn finish_summary(args: &Value) -> String {
    args.get("message")
        .or_else(|| args.get("summary"))
        .and_then(|v| v.as_str())
        .unwrap_or("Task completed")
        .to_string()
}

#[async_trait]
impl Tool for FinishTaskTool {
    fn name(&self) -> &str {
        "finish_task"
    }

    fn description(&self) -> &str {
        "Signal that the task is complete. Args: {\"message\": \"final summary of what was done\"}"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "message": { "type": "string", "description": "Final summary" }
            },
            "required": ["message"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        Ok(format!("Task finished: {}", finish_summary(&args)))
    }
}

/// request_more_steps：请求增加步数预算，reason 参数说明原因
#[derive(Debug, Default)]
pub struct RequestMoreStepsTool;

#[async_trait]
impl Tool for RequestMoreStepsTool {
    fn name(&self) -> &str {
        "request_more_steps"
    }

    fn description(&self) -> &str {
        "Request additional step budget when the task needs more iterations. Args: {\"reason\": \"why more steps are needed\"}"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "reason": { "type": "string", "description": "Why more steps are needed" }
            },
            "required": ["reason"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let reason = args
            .get("reason")
            .and_then(|v| v.as_str())
            .unwrap_or("no reason given");
        Ok(format!("Requested more steps: {}", reason))
    }
}

/// return_text：原样返回输入文本
#[derive(Debug, Default)]
pub struct ReturnTextTool;

#[async_trait]
impl Tool for ReturnTextTool {
    fn name(&self) -> &str {
        "return_text"
    }

    fn description(&self) -> &str {
        "Return the given text verbatim as a tool result. Args: {\"text\": \"text to return\"}"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "text": { "type": "string", "description": "Text to return" }
            },
            "required": ["text"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        Ok(args
            .get("text")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finish_summary_prefers_message() {
        let args = serde_json::json!({"message": "wrote the file"});
        assert_eq!(finish_summary(&args), "wrote the file");

        let args = serde_json::json!({"summary": "alt key"});
        assert_eq!(finish_summary(&args), "alt key");

        assert_eq!(finish_summary(&Value::Null), "Task completed");
    }

    #[tokio::test]
    async fn test_return_text_verbatim() {
        let out = ReturnTextTool
            .execute(serde_json::json!({"text": "exactly this"}))
            .await
            .unwrap();
        assert_eq!(out, "exactly this");
    }

    #[tokio::test]
    async fn test_request_more_steps_echoes_reason() {
        let out = RequestMoreStepsTool
            .execute(serde_json::json!({"reason": "long build"}))
            .await
            .unwrap();
        assert!(out.contains("long build"));
    }
}
