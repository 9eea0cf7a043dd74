//! 核心层：任务数据模型、错误类型、任务持久化

pub mod error;
pub mod persistence;
pub mod task;

pub use error::AgentError;
pub use persistence::TaskPersistence;
pub use task::{Task, TaskStatus, ToolCall, ToolResult, Turn, TurnContent, TurnHistory, TurnRole};
