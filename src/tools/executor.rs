//! 工具执行器
//!
//! 持有 ToolRegistry 与全局超时，对每次调用施加超时并软化失败：
//! 工具返回 Err 或超时都转为 success=false 的 ToolResult，不终止任务；
//! 仅外部取消向上返回 AgentError::Cancelled。每次调用输出结构化审计日志（JSON）。

use std::time::{Duration, Instant};

use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::core::{AgentError, ToolCall, ToolResult};
use crate::tools::ToolRegistry;

/// 工具执行器：校验 + 超时执行，产出 ToolResult
pub struct ToolExecutor {
    registry: ToolRegistry,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, timeout_secs: u64) -> Self {
        Self {
            registry,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// 执行已校验的 ToolCall；超时与工具失败软化为 success=false，
    /// 取消信号返回 Err(Cancelled)。输出 JSON 审计日志。
    pub async fn execute(
        &self,
        call: &ToolCall,
        cancel: &CancellationToken,
    ) -> Result<ToolResult, AgentError> {
        let tool = self.registry.validate(call)?;

        let start = Instant::now();
        let args_preview = args_preview(&call.args);

        let run = timeout(self.timeout, tool.execute(call.args.clone()));
        let result = tokio::select! {
            _ = cancel.cancelled() => {
                audit(&call.tool, false, "cancelled", start, &args_preview);
                return Err(AgentError::Cancelled);
            }
            r = run => r,
        };

        let (ok, outcome): (bool, &str) = match &result {
            Ok(Ok(_)) => (true, "ok"),
            Ok(Err(_)) => (false, "error"),
            Err(_) => (false, "timeout"),
        };
        audit(&call.tool, ok, outcome, start, &args_preview);

        let result = match result {
            Ok(Ok(output)) => ToolResult {
                tool: call.tool.clone(),
                output,
                success: true,
            },
            Ok(Err(e)) => ToolResult {
                tool: call.tool.clone(),
                output: format!("Error: {}", e),
                success: false,
            },
            Err(_) => ToolResult {
                tool: call.tool.clone(),
                output: format!("Error: tool timed out after {}s", self.timeout.as_secs()),
                success: false,
            },
        };
        Ok(result)
    }
}

fn audit(tool: &str, ok: bool, outcome: &str, start: Instant, args_preview: &str) {
    let audit = serde_json::json!({
        "event": "tool_audit",
        "tool": tool,
        "ok": ok,
        "outcome": outcome,
        "duration_ms": start.elapsed().as_millis() as u64,
        "args_preview": args_preview,
    });
    tracing::info!(audit = %audit.to_string(), "tool");
}

fn args_preview(args: &serde_json::Value) -> String {
    let s = args.to_string();
    if s.len() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}
