//! Agent 错误类型
//!
//! 组件边界（gateway / tools / memory）统一转为 AgentError，
//! 由编排器唯一决定「致命终止」还是「步内恢复」。

use thiserror::Error;

/// Agent 运行过程中可能出现的错误（网络、解析、工具、路径逃逸等）
#[derive(Error, Debug)]
pub enum AgentError {
    /// 回退链上所有提供商均不可用，当前任务致命
    #[error("No model provider available")]
    NoProviderAvailable,

    /// 提供商返回无法解码为 Action 的文本，可在重试上限内纠正
    #[error("Malformed model response: {0}")]
    MalformedResponse(String),

    /// 模型请求了未注册的工具名，可在重试上限内纠正
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Tool execution failed: {0}")]
    ToolExecutionFailed(String),

    #[error("Tool timeout: {0}")]
    ToolTimeout(String),

    /// 记忆库故障，降级为无上下文，不致命
    #[error("Memory store unavailable: {0}")]
    MemoryUnavailable(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Path escape attempt: {0}")]
    PathEscape(String),

    /// 外部取消信号（用户中断）
    #[error("Cancelled")]
    Cancelled,
}
