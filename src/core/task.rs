//! 任务数据模型
//!
//! Task 持有目标、状态、剩余步数与 append-only 的 TurnHistory；
//! Turn 一经追加不可修改，历史顺序即回放给模型的唯一事实来源。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 工具调用（模型产出，未经 ToolRegistry 校验前不可信）
/// 线格式：{"tool": "write_file", "args": {"path": "...", "content": "..."}}
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

/// 工具执行结果（ToolRegistry 产出，以 tool 轮次追加进历史）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool: String,
    pub output: String,
    pub success: bool,
}

/// 轮次角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Model,
    Tool,
}

/// 轮次内容：纯文本，或结构化的 ToolCall / ToolResult
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TurnContent {
    Text { text: String },
    ToolCall(ToolCall),
    ToolResult(ToolResult),
}

/// 对话历史中的一条轮次，追加后不可变
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub content: TurnContent,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: TurnContent::Text { text: text.into() },
            timestamp: Utc::now(),
        }
    }

    pub fn model_text(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Model,
            content: TurnContent::Text { text: text.into() },
            timestamp: Utc::now(),
        }
    }

    pub fn model_call(call: ToolCall) -> Self {
        Self {
            role: TurnRole::Model,
            content: TurnContent::ToolCall(call),
            timestamp: Utc::now(),
        }
    }

    pub fn tool_result(result: ToolResult) -> Self {
        Self {
            role: TurnRole::Tool,
            content: TurnContent::ToolResult(result),
            timestamp: Utc::now(),
        }
    }

    /// 渲染为回放给模型的纯文本
    pub fn render(&self) -> String {
        match &self.content {
            TurnContent::Text { text } => text.clone(),
            TurnContent::ToolCall(tc) => {
                format!("Tool call: {} args: {}", tc.tool, tc.args)
            }
            TurnContent::ToolResult(tr) => {
                let status = if tr.success { "ok" } else { "error" };
                format!("Result of {} ({}): {}", tr.tool, status, tr.output)
            }
        }
    }
}

/// Append-only 轮次历史：只暴露追加与只读访问，不提供删除或重排
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurnHistory {
    turns: Vec<Turn>,
}

impl TurnHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

/// 任务状态机：Pending -> Running -> {Completed, Failed, Aborted}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed { summary: String },
    Failed { reason: String },
    Aborted,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed { .. } | TaskStatus::Failed { .. } | TaskStatus::Aborted
        )
    }
}

/// 一次用户目标的完整执行记录，由单个编排器运行独占
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub objective: String,
    pub status: TaskStatus,
    pub steps_remaining: u32,
    pub history: TurnHistory,
}

impl Task {
    pub fn new(objective: impl Into<String>, step_budget: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            objective: objective.into(),
            status: TaskStatus::Pending,
            steps_remaining: step_budget,
            history: TurnHistory::new(),
        }
    }
}
