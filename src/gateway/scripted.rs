//! Scripted 提供商（测试与本地演练用，无需 API）
//!
//! 按脚本顺序逐条返回预设响应；脚本耗尽后返回终止文本。
//! 也可构造为永久失败（DownProvider），用于回退链测试。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::core::Turn;
use crate::gateway::{ModelProvider, ProviderError};

/// 按脚本回放响应的提供商
pub struct ScriptedProvider {
    name: String,
    script: Mutex<VecDeque<String>>,
}

impl ScriptedProvider {
    pub fn new(name: impl Into<String>, responses: Vec<&str>) -> Self {
        Self {
            name: name.into(),
            script: Mutex::new(responses.into_iter().map(String::from).collect()),
        }
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, _turns: &[Turn]) -> Result<String, ProviderError> {
        let next = self
            .script
            .lock()
            .map_err(|e| ProviderError::Connection(e.to_string()))?
            .pop_front();
        Ok(next.unwrap_or_else(|| "Script exhausted; stopping here.".to_string()))
    }
}

/// 永久失败的提供商（模拟宕机后端）
pub struct DownProvider {
    name: String,
}

impl DownProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl ModelProvider for DownProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, _turns: &[Turn]) -> Result<String, ProviderError> {
        Err(ProviderError::Connection("simulated outage".to_string()))
    }
}
