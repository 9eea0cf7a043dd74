//! Gemini 提供商（generativelanguage.googleapis.com）
//!
//! 非流式 generateContent；HTTP 状态码映射到 ProviderError 类别
//! （401/403 认证、429 配额、其余连接错误），供网关标记不可用并回退。

use async_trait::async_trait;
use serde_json::json;

use crate::core::{Turn, TurnRole};
use crate::gateway::{ModelProvider, ProviderError};

const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiProvider {
    name: String,
    model: String,
    api_key: String,
    endpoint: String,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(
        name: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        endpoint: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            api_key: api_key.into(),
            endpoint: endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            client: reqwest::Client::new(),
        }
    }

    /// Gemini 的 contents 格式：Model -> "model"，其余 -> "user"
    fn contents(turns: &[Turn]) -> Vec<serde_json::Value> {
        turns
            .iter()
            .map(|t| {
                let role = match t.role {
                    TurnRole::Model => "model",
                    TurnRole::User | TurnRole::Tool => "user",
                };
                json!({ "role": role, "parts": [{ "text": t.render() }] })
            })
            .collect()
    }
}

#[async_trait]
impl ModelProvider for GeminiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, turns: &[Turn]) -> Result<String, ProviderError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.endpoint, self.model, self.api_key
        );
        let payload = json!({ "contents": Self::contents(turns) });

        let response = self
            .client
            .post(&url)
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
                401 | 403 => ProviderError::Auth(text),
                429 => ProviderError::Quota(text),
                _ => ProviderError::Connection(format!("Gemini API error ({}): {}", status, text)),
            });
        }

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Connection(e.to_string()))?;

        let text = data
            .get("candidates")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .and_then(|c| c.pointer("/content/parts"))
            .and_then(|p| p.as_array())
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .ok_or_else(|| ProviderError::Connection("no candidates in response".to_string()))?;

        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contents_role_mapping() {
        let turns = vec![Turn::user("objective"), Turn::model_text("plan")];
        let contents = GeminiProvider::contents(&turns);
        assert_eq!(contents[0]["role"], "user");
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[0]["parts"][0]["text"], "objective");
    }
}
