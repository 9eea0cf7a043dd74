//! Ollama 提供商（本地，默认 http://localhost:11434）
//!
//! 非流式 /api/chat，format=json 约束模型输出 JSON 工具调用。

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::core::Turn;
use crate::gateway::{to_chat_messages, ModelProvider, ProviderError};

const DEFAULT_ENDPOINT: &str = "http://localhost:11434";

pub struct OllamaProvider {
    name: String,
    model: String,
    endpoint: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: OllamaMessage,
}

#[derive(Deserialize)]
struct OllamaMessage {
    content: String,
}

impl OllamaProvider {
    pub fn new(
        name: impl Into<String>,
        model: impl Into<String>,
        endpoint: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            endpoint: endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ModelProvider for OllamaProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, turns: &[Turn]) -> Result<String, ProviderError> {
        let messages: Vec<serde_json::Value> = to_chat_messages(turns)
            .into_iter()
            .map(|(role, content)| json!({ "role": role, "content": content }))
            .collect();
        let payload = json!({
            "model": self.model,
            "messages": messages,
            "stream": false,
            "format": "json",
        });

        let response = self
            .client
            .post(format!("{}/api/chat", self.endpoint))
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout
                } else {
                    ProviderError::Connection(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                429 => ProviderError::Quota(text),
                _ => ProviderError::Connection(format!("Ollama API error ({}): {}", status, text)),
            });
        }

        let data: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Connection(e.to_string()))?;
        Ok(data.message.content)
    }
}
