//! 任务编排器
//!
//! 单任务执行循环：取消检查 -> 预算检查 -> 记忆检索 -> 模型生成 -> 动作分发。
//! 工具执行消耗步数；格式纠正、未知工具纠正、预算申请与记忆检索不消耗。
//! 终态一经进入即停止变更历史，任务落盘并写入完成记忆。

pub mod prompt;

pub use prompt::{build_system_prompt, render_memory_context};

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::core::{AgentError, Task, TaskPersistence, TaskStatus, ToolResult, Turn};
use crate::gateway::{Action, ModelGateway};
use crate::memory::MemoryStore;
use crate::tools::{finish_summary, ToolExecutor};

/// 编排参数：初始步数预算、单次追加量、纠正重试上限、记忆检索条数
#[derive(Debug, Clone)]
pub struct OrchestratorLimits {
    pub step_budget: u32,
    pub step_increment: u32,
    pub max_correction_retries: u32,
    pub memory_top_k: usize,
}

impl Default for OrchestratorLimits {
    fn default() -> Self {
        Self {
            step_budget: 10,
            step_increment: 10,
            max_correction_retries: 3,
            memory_top_k: 3,
        }
    }
}

/// 任务编排器：持有网关、执行器、记忆与可选持久化，驱动任务到终态
pub struct TaskOrchestrator {
    gateway: ModelGateway,
    executor: ToolExecutor,
    memory: Arc<dyn MemoryStore>,
    persistence: Option<TaskPersistence>,
    limits: OrchestratorLimits,
}

impl TaskOrchestrator {
    pub fn new(
        gateway: ModelGateway,
        executor: ToolExecutor,
        memory: Arc<dyn MemoryStore>,
        limits: OrchestratorLimits,
    ) -> Self {
        Self {
            gateway,
            executor,
            memory,
            persistence: None,
            limits,
        }
    }

    /// 启用任务落盘（每任务一个 JSON 文件）
    pub fn with_persistence(mut self, persistence: TaskPersistence) -> Self {
        self.persistence = Some(persistence);
        self
    }

    /// 执行一个目标直到终态。永远返回带终态的 Task，不向调用方抛错：
    /// 所有失败路径都折叠为 Failed/Aborted 状态。
    pub async fn run(&self, objective: &str, cancel: &CancellationToken) -> Task {
        let mut task = Task::new(objective, self.limits.step_budget);
        task.status = TaskStatus::Running;
        tracing::info!(
            task_id = %task.id,
            objective = %task.objective,
            budget = task.steps_remaining,
            "task started"
        );

        task.history
            .push(Turn::user(build_system_prompt(self.executor.registry(), objective)));

        // 格式错误与未知工具共用一个纠正计数，得到有效动作后归零
        let mut corrections: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                task.status = TaskStatus::Aborted;
                break;
            }
            if task.steps_remaining == 0 {
                task.status = TaskStatus::Failed {
                    reason: "step budget exhausted".to_string(),
                };
                break;
            }

            // 纠正回合不重复注入记忆上下文
            if corrections == 0 {
                self.attach_memory_context(&mut task);
            }

            let action = match self.gateway.generate(&mut task.history).await {
                Ok(action) => action,
                Err(AgentError::MalformedResponse(detail)) => {
                    corrections += 1;
                    if corrections > self.limits.max_correction_retries {
                        task.status = TaskStatus::Failed {
                            reason: format!(
                                "model output unparsable after {} attempts",
                                corrections
                            ),
                        };
                        break;
                    }
                    tracing::warn!(
                        task_id = %task.id,
                        attempt = corrections,
                        detail = %detail,
                        "malformed model response, requesting correction"
                    );
                    task.history.push(Turn::user(format!(
                        "Your previous response could not be parsed ({}). Respond with \
                        exactly one JSON object: {{\"tool\": \"tool_name\", \"args\": {{...}}}}",
                        detail
                    )));
                    continue;
                }
                Err(AgentError::NoProviderAvailable) => {
                    task.status = TaskStatus::Failed {
                        reason: "no model provider available".to_string(),
                    };
                    break;
                }
                Err(e) => {
                    task.status = TaskStatus::Failed {
                        reason: format!("gateway error: {}", e),
                    };
                    break;
                }
            };

            match action {
                // 纯文本即隐式完成，文本本身作为摘要
                Action::TerminalText(text) => {
                    task.history.push(Turn::model_text(text.clone()));
                    self.complete(&mut task, text);
                    break;
                }
                Action::ToolCall(call) => {
                    task.history.push(Turn::model_call(call.clone()));

                    if self.executor.registry().get(&call.tool).is_none() {
                        corrections += 1;
                        if corrections > self.limits.max_correction_retries {
                            task.status = TaskStatus::Failed {
                                reason: format!(
                                    "unknown tool '{}' requested after {} corrections",
                                    call.tool, corrections
                                ),
                            };
                            break;
                        }
                        tracing::warn!(task_id = %task.id, tool = %call.tool, "unknown tool requested");
                        let valid = self.executor.registry().tool_names().join(", ");
                        task.history.push(Turn::tool_result(ToolResult {
                            tool: call.tool.clone(),
                            output: format!(
                                "Unknown tool '{}'. Valid tools: {}",
                                call.tool, valid
                            ),
                            success: false,
                        }));
                        continue;
                    }
                    corrections = 0;

                    if call.tool == "finish_task" {
                        let summary = finish_summary(&call.args);
                        task.history.push(Turn::tool_result(ToolResult {
                            tool: call.tool.clone(),
                            output: format!("Task finished: {}", summary),
                            success: true,
                        }));
                        self.complete(&mut task, summary);
                        break;
                    }

                    if call.tool == "request_more_steps" {
                        task.steps_remaining += self.limits.step_increment;
                        tracing::info!(
                            task_id = %task.id,
                            steps_remaining = task.steps_remaining,
                            "step budget extended"
                        );
                        task.history.push(Turn::tool_result(ToolResult {
                            tool: call.tool.clone(),
                            output: format!(
                                "Step budget increased by {}; {} steps remaining.",
                                self.limits.step_increment, task.steps_remaining
                            ),
                            success: true,
                        }));
                        continue;
                    }

                    let result = match self.executor.execute(&call, cancel).await {
                        Ok(result) => result,
                        Err(AgentError::Cancelled) => {
                            task.status = TaskStatus::Aborted;
                            break;
                        }
                        Err(e) => ToolResult {
                            tool: call.tool.clone(),
                            output: format!("Error: {}", e),
                            success: false,
                        },
                    };
                    task.history.push(Turn::tool_result(result));
                    task.steps_remaining -= 1;
                }
            }
        }

        self.finalize(&task);
        task
    }

    /// 按当前上下文检索记忆并注入为 user 轮次；检索失败降级为无上下文
    fn attach_memory_context(&self, task: &mut Task) {
        let query = match task.history.last() {
            Some(turn) if task.history.len() > 1 => turn.render(),
            _ => task.objective.clone(),
        };
        match self.memory.query(&query, self.limits.memory_top_k) {
            Ok(records) => {
                if let Some(block) = render_memory_context(&records) {
                    task.history.push(Turn::user(block));
                }
            }
            Err(e) => {
                tracing::warn!(task_id = %task.id, error = %e, "memory lookup failed, continuing without context");
            }
        }
    }

    /// 完成路径（显式 finish_task 与隐式终止文本共用）：置终态并写入一条完成记忆
    fn complete(&self, task: &mut Task, summary: String) {
        task.status = TaskStatus::Completed {
            summary: summary.clone(),
        };
        let mut metadata = HashMap::new();
        metadata.insert("type".to_string(), "task_completion".to_string());
        metadata.insert("success".to_string(), "true".to_string());
        metadata.insert("task_id".to_string(), task.id.to_string());
        let text = format!("Task: {}\nOutcome: {}", task.objective, summary);
        if let Err(e) = self.memory.save(&text, metadata) {
            tracing::warn!(task_id = %task.id, error = %e, "failed to record task completion");
        }
    }

    fn finalize(&self, task: &Task) {
        tracing::info!(
            task_id = %task.id,
            status = ?task.status,
            steps_remaining = task.steps_remaining,
            turns = task.history.len(),
            "task finished"
        );
        if let Some(persistence) = &self.persistence {
            if let Err(e) = persistence.save(task) {
                tracing::warn!(task_id = %task.id, error = %e, "failed to persist task");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{ModelProvider, ProviderAvailability, ScriptedProvider};
    use crate::memory::NoopMemory;
    use crate::tools::{FinishTaskTool, RequestMoreStepsTool, ReturnTextTool, ToolRegistry};

    fn orchestrator(responses: Vec<&str>, limits: OrchestratorLimits) -> TaskOrchestrator {
        let providers: Vec<Arc<dyn ModelProvider>> =
            vec![Arc::new(ScriptedProvider::new("scripted", responses))];
        let gateway = ModelGateway::new(providers, ProviderAvailability::new(), 5);
        let mut registry = ToolRegistry::new();
        registry.register(FinishTaskTool);
        registry.register(RequestMoreStepsTool);
        registry.register(ReturnTextTool);
        let executor = ToolExecutor::new(registry, 5);
        TaskOrchestrator::new(gateway, executor, Arc::new(NoopMemory), limits)
    }

    #[tokio::test]
    async fn test_explicit_finish_completes() {
        let orch = orchestrator(
            vec![r#"{"tool": "finish_task", "args": {"message": "nothing to do"}}"#],
            OrchestratorLimits::default(),
        );
        let task = orch.run("do nothing", &CancellationToken::new()).await;
        assert_eq!(
            task.status,
            TaskStatus::Completed {
                summary: "nothing to do".to_string()
            }
        );
        // finish_task 不消耗步数
        assert_eq!(task.steps_remaining, 10);
    }

    #[tokio::test]
    async fn test_terminal_text_is_implicit_finish() {
        let orch = orchestrator(
            vec!["All done, the answer is 42."],
            OrchestratorLimits::default(),
        );
        let task = orch.run("compute the answer", &CancellationToken::new()).await;
        assert!(matches!(task.status, TaskStatus::Completed { ref summary } if summary.contains("42")));
    }

    #[tokio::test]
    async fn test_tool_execution_consumes_step() {
        let orch = orchestrator(
            vec![
                r#"{"tool": "return_text", "args": {"text": "step one"}}"#,
                r#"{"tool": "finish_task", "args": {"message": "done"}}"#,
            ],
            OrchestratorLimits::default(),
        );
        let task = orch.run("echo once", &CancellationToken::new()).await;
        assert!(task.status.is_terminal());
        assert_eq!(task.steps_remaining, 9);
    }

    #[tokio::test]
    async fn test_request_more_steps_extends_budget() {
        let orch = orchestrator(
            vec![
                r#"{"tool": "request_more_steps", "args": {"reason": "long task"}}"#,
                r#"{"tool": "finish_task", "args": {"message": "done"}}"#,
            ],
            OrchestratorLimits {
                step_budget: 2,
                step_increment: 5,
                ..Default::default()
            },
        );
        let task = orch.run("extend me", &CancellationToken::new()).await;
        assert!(matches!(task.status, TaskStatus::Completed { .. }));
        // 2 + 5，期间无工具执行扣减
        assert_eq!(task.steps_remaining, 7);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_aborts() {
        let orch = orchestrator(vec!["should never be consulted"], OrchestratorLimits::default());
        let token = CancellationToken::new();
        token.cancel();
        let task = orch.run("anything", &token).await;
        assert_eq!(task.status, TaskStatus::Aborted);
        // 仅开场提示，未再追加
        assert_eq!(task.history.len(), 1);
    }
}
