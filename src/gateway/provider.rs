//! 模型提供商抽象
//!
//! 所有后端（Gemini / Ollama / Scripted）实现 ModelProvider：invoke(上下文) -> 原始文本。
//! 失败模式（认证 / 配额 / 超时 / 连接）统一为 ProviderError，网关据此标记不可用并回退。

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use thiserror::Error;

use crate::core::{Turn, TurnRole};

/// 提供商调用失败的类别；网关对任一类别的处理都是「标记不可用，前进回退」
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("authentication error: {0}")]
    Auth(String),

    #[error("rate/quota exceeded: {0}")]
    Quota(String),

    #[error("request timeout")]
    Timeout,

    #[error("connection error: {0}")]
    Connection(String),
}

/// 模型提供商 trait：给定轮次历史，返回下一步的原始响应文本
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// 提供商名（可用性缓存与回退日志的 key）
    fn name(&self) -> &str;

    async fn invoke(&self, turns: &[Turn]) -> Result<String, ProviderError>;
}

/// 将轮次历史渲染为 (role, text) 聊天消息；Model -> assistant，User / Tool -> user
pub fn to_chat_messages(turns: &[Turn]) -> Vec<(String, String)> {
    turns
        .iter()
        .map(|t| {
            let role = match t.role {
                TurnRole::Model => "assistant",
                TurnRole::User | TurnRole::Tool => "user",
            };
            (role.to_string(), t.render())
        })
        .collect()
}

/// 进程级提供商可用性缓存
///
/// 生命周期：懒惰填充，仅进程重启时清空；注入网关而非隐式全局，便于测试替换。
/// 更新为幂等的 last-writer-wins，可被多任务并发读写。
#[derive(Clone, Default)]
pub struct ProviderAvailability {
    inner: Arc<RwLock<HashMap<String, bool>>>,
}

impl ProviderAvailability {
    pub fn new() -> Self {
        Self::default()
    }

    /// 调用成功后记为可达，后续任务免探测
    pub fn mark_available(&self, name: &str) {
        if let Ok(mut map) = self.inner.write() {
            map.insert(name.to_string(), true);
        }
    }

    /// 调用失败后在本进程剩余生命周期内视为不可用
    pub fn mark_unavailable(&self, name: &str) {
        if let Ok(mut map) = self.inner.write() {
            map.insert(name.to_string(), false);
        }
    }

    pub fn is_unavailable(&self, name: &str) -> bool {
        self.inner
            .read()
            .map(|map| map.get(name) == Some(&false))
            .unwrap_or(false)
    }
}
