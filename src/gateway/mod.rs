//! 模型网关
//!
//! 按优先级持有提供商回退链与进程级可用性缓存；generate 在链上前进尝试，
//! 调用失败即标记不可用并向 turn_history 追加一条回退说明（对模型可见），
//! 成功响应经 parse 严格解码为 Action。

pub mod gemini;
pub mod ollama;
pub mod parse;
pub mod provider;
pub mod scripted;

pub use gemini::GeminiProvider;
pub use ollama::OllamaProvider;
pub use parse::{decode_action, Action};
pub use provider::{to_chat_messages, ModelProvider, ProviderAvailability, ProviderError};
pub use scripted::{DownProvider, ScriptedProvider};

use std::sync::Arc;
use std::time::Duration;

use crate::core::{AgentError, Turn, TurnHistory};

/// 模型网关：回退链 + 可用性缓存 + 响应解码
pub struct ModelGateway {
    /// 降序优先级
    providers: Vec<Arc<dyn ModelProvider>>,
    availability: ProviderAvailability,
    request_timeout: Duration,
}

impl ModelGateway {
    pub fn new(
        providers: Vec<Arc<dyn ModelProvider>>,
        availability: ProviderAvailability,
        request_timeout_secs: u64,
    ) -> Self {
        Self {
            providers,
            availability,
            request_timeout: Duration::from_secs(request_timeout_secs),
        }
    }

    /// 当前会选中的提供商名（跳过缓存为不可用者）；None 表示链已耗尽
    pub fn active_provider(&self) -> Option<&str> {
        self.providers
            .iter()
            .find(|p| !self.availability.is_unavailable(p.name()))
            .map(|p| p.name())
    }

    /// 生成下一步动作。
    ///
    /// 依次尝试可用提供商：超时或 ProviderError 都使该提供商在本进程内
    /// 永久标记为不可用，并向历史追加回退说明后继续下一个；任务内因此
    /// 只会沿优先级前进，不会回摆。全部失败返回 NoProviderAvailable；
    /// 成功但解码失败返回 MalformedResponse（调用方可在重试上限内纠正）。
    pub async fn generate(&self, history: &mut TurnHistory) -> Result<Action, AgentError> {
        for provider in &self.providers {
            let name = provider.name();
            if self.availability.is_unavailable(name) {
                continue;
            }

            let invoked =
                tokio::time::timeout(self.request_timeout, provider.invoke(history.turns())).await;
            let raw = match invoked {
                Err(_) => {
                    self.note_fallback(history, name, "request timeout");
                    continue;
                }
                Ok(Err(e)) => {
                    self.note_fallback(history, name, &e.to_string());
                    continue;
                }
                Ok(Ok(raw)) => raw,
            };

            self.availability.mark_available(name);
            tracing::debug!(provider = %name, chars = raw.len(), "model response received");
            return decode_action(&raw);
        }

        tracing::error!("all model providers exhausted");
        Err(AgentError::NoProviderAvailable)
    }

    fn note_fallback(&self, history: &mut TurnHistory, name: &str, reason: &str) {
        self.availability.mark_unavailable(name);
        tracing::warn!(provider = %name, reason = %reason, "provider failed, advancing fallback");
        history.push(Turn::user(format!(
            "[gateway] Model provider '{}' became unavailable ({}); continuing with the next provider.",
            name, reason
        )));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history() -> TurnHistory {
        let mut h = TurnHistory::new();
        h.push(Turn::user("objective"));
        h
    }

    #[tokio::test]
    async fn test_fallback_skips_down_provider() {
        let providers: Vec<Arc<dyn ModelProvider>> = vec![
            Arc::new(DownProvider::new("a")),
            Arc::new(ScriptedProvider::new("b", vec!["all good, done"])),
        ];
        let availability = ProviderAvailability::new();
        let gateway = ModelGateway::new(providers, availability.clone(), 5);

        let mut h = history();
        let action = gateway.generate(&mut h).await.unwrap();
        assert!(matches!(action, Action::TerminalText(_)));
        // 回退说明已追加且对模型可见
        assert_eq!(h.len(), 2);
        assert!(h.last().unwrap().render().contains("'a'"));
        assert!(availability.is_unavailable("a"));
        assert!(!availability.is_unavailable("b"));
    }

    #[tokio::test]
    async fn test_down_provider_not_retried_after_marking() {
        let providers: Vec<Arc<dyn ModelProvider>> = vec![
            Arc::new(DownProvider::new("a")),
            Arc::new(ScriptedProvider::new("b", vec!["first", "second"])),
        ];
        let availability = ProviderAvailability::new();
        let gateway = ModelGateway::new(providers, availability, 5);

        let mut h = history();
        gateway.generate(&mut h).await.unwrap();
        let before = h.len();
        gateway.generate(&mut h).await.unwrap();
        // 第二次不再尝试 a，不追加新的回退说明
        assert_eq!(h.len(), before);
        assert_eq!(gateway.active_provider(), Some("b"));
    }

    #[tokio::test]
    async fn test_all_down_is_no_provider_available() {
        let providers: Vec<Arc<dyn ModelProvider>> = vec![
            Arc::new(DownProvider::new("a")),
            Arc::new(DownProvider::new("b")),
        ];
        let gateway = ModelGateway::new(providers, ProviderAvailability::new(), 5);

        let mut h = history();
        let err = gateway.generate(&mut h).await.unwrap_err();
        assert!(matches!(err, AgentError::NoProviderAvailable));
        assert!(gateway.active_provider().is_none());
    }

    #[tokio::test]
    async fn test_malformed_response_surfaced() {
        let providers: Vec<Arc<dyn ModelProvider>> = vec![Arc::new(ScriptedProvider::new(
            "a",
            vec![r#"{"tool": "x", bad json"#],
        ))];
        let gateway = ModelGateway::new(providers, ProviderAvailability::new(), 5);

        let mut h = history();
        let err = gateway.generate(&mut h).await.unwrap_err();
        assert!(matches!(err, AgentError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_cached_availability_shared_across_gateways() {
        let availability = ProviderAvailability::new();
        {
            let providers: Vec<Arc<dyn ModelProvider>> = vec![
                Arc::new(DownProvider::new("a")),
                Arc::new(ScriptedProvider::new("b", vec!["done"])),
            ];
            let gateway = ModelGateway::new(providers, availability.clone(), 5);
            let mut h = history();
            gateway.generate(&mut h).await.unwrap();
        }
        // 新任务的网关复用进程级缓存，a 不再被探测
        let providers: Vec<Arc<dyn ModelProvider>> = vec![
            Arc::new(DownProvider::new("a")),
            Arc::new(ScriptedProvider::new("b", vec!["done"])),
        ];
        let gateway = ModelGateway::new(providers, availability, 5);
        let mut h = history();
        gateway.generate(&mut h).await.unwrap();
        assert_eq!(h.len(), 1, "no fallback note on cached-unavailable skip");
    }
}
