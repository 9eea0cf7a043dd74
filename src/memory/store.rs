//! 长期记忆接口
//!
//! 编排器只依赖 save / query 两个操作，相似度检索内部实现视为黑盒；
//! 参考实现为关键词重叠打分（KeywordMemory），后续可接真实向量库。

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::core::AgentError;

/// 一条记忆记录：文本 + 元数据 + 创建时间
#[derive(Debug, Clone)]
pub struct MemoryRecord {
    pub text: String,
    pub metadata: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
}

/// 长期记忆 trait：写入与相似度检索（最相关在前）
///
/// 实现必须容忍空结果集；调用方（编排器）在出错时降级为「无上下文」，不使任务失败。
pub trait MemoryStore: Send + Sync {
    /// 存入一段文本与元数据，返回记录 id
    fn save(&self, text: &str, metadata: HashMap<String, String>) -> Result<Uuid, AgentError>;

    /// 按查询检索最相关的 k 条
    fn query(&self, text: &str, k: usize) -> Result<Vec<MemoryRecord>, AgentError>;
}

/// 空实现：未启用长期记忆时使用
#[derive(Clone, Default)]
pub struct NoopMemory;

impl MemoryStore for NoopMemory {
    fn save(&self, _text: &str, _metadata: HashMap<String, String>) -> Result<Uuid, AgentError> {
        Ok(Uuid::new_v4())
    }

    fn query(&self, _text: &str, _k: usize) -> Result<Vec<MemoryRecord>, AgentError> {
        Ok(Vec::new())
    }
}

/// 将文本切分为小写词集合，用于简单相似度（词重叠数）
fn tokenize_lower(s: &str) -> HashSet<String> {
    s.split_whitespace()
        .map(|w| w.to_lowercase())
        .filter(|w| w.len() > 1)
        .collect()
}

/// 内存实现：按关键词重叠检索，条数超限时丢弃最旧
#[derive(Clone)]
pub struct KeywordMemory {
    store: Arc<RwLock<Vec<(MemoryRecord, HashSet<String>)>>>,
    max_entries: usize,
}

impl KeywordMemory {
    pub fn new(max_entries: usize) -> Self {
        Self {
            store: Arc::new(RwLock::new(Vec::new())),
            max_entries,
        }
    }
}

impl Default for KeywordMemory {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl MemoryStore for KeywordMemory {
    fn save(&self, text: &str, metadata: HashMap<String, String>) -> Result<Uuid, AgentError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AgentError::MemoryUnavailable("empty text".to_string()));
        }
        let id = Uuid::new_v4();
        let tokens = tokenize_lower(text);
        let record = MemoryRecord {
            text: text.to_string(),
            metadata,
            created_at: Utc::now(),
        };
        let mut store = self
            .store
            .write()
            .map_err(|e| AgentError::MemoryUnavailable(e.to_string()))?;
        store.push((record, tokens));
        let n = store.len();
        if n > self.max_entries {
            store.drain(0..n - self.max_entries);
        }
        Ok(id)
    }

    fn query(&self, text: &str, k: usize) -> Result<Vec<MemoryRecord>, AgentError> {
        let query_tokens = tokenize_lower(text);
        if query_tokens.is_empty() {
            return Ok(Vec::new());
        }
        let store = self
            .store
            .read()
            .map_err(|e| AgentError::MemoryUnavailable(e.to_string()))?;
        let mut scored: Vec<(usize, MemoryRecord)> = store
            .iter()
            .map(|(record, doc_tokens)| {
                (query_tokens.intersection(doc_tokens).count(), record.clone())
            })
            .filter(|(s, _)| *s > 0)
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(scored.into_iter().take(k).map(|(_, r)| r).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_returns_empty() {
        let mem = NoopMemory;
        assert!(mem.query("anything", 3).unwrap().is_empty());
        mem.save("ignored", HashMap::new()).unwrap();
        assert!(mem.query("ignored", 3).unwrap().is_empty());
    }

    #[test]
    fn test_keyword_query_ranks_by_overlap() {
        let mem = KeywordMemory::new(100);
        mem.save("rust async runtime tokio", HashMap::new()).unwrap();
        mem.save("python flask web server", HashMap::new()).unwrap();
        mem.save("rust tokio timers and timeouts", HashMap::new())
            .unwrap();

        let results = mem.query("rust tokio timeouts", 2).unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].text.contains("timers"));
    }

    #[test]
    fn test_keyword_empty_query() {
        let mem = KeywordMemory::new(100);
        mem.save("something stored", HashMap::new()).unwrap();
        assert!(mem.query("", 3).unwrap().is_empty());
    }

    #[test]
    fn test_keyword_eviction() {
        let mem = KeywordMemory::new(2);
        mem.save("first entry about apples", HashMap::new()).unwrap();
        mem.save("second entry about pears", HashMap::new()).unwrap();
        mem.save("third entry about plums", HashMap::new()).unwrap();
        assert!(mem.query("apples", 3).unwrap().is_empty());
        assert_eq!(mem.query("plums", 3).unwrap().len(), 1);
    }

    #[test]
    fn test_metadata_preserved() {
        let mem = KeywordMemory::new(10);
        let mut meta = HashMap::new();
        meta.insert("type".to_string(), "task_completion".to_string());
        mem.save("finished writing hello.txt", meta).unwrap();
        let results = mem.query("hello.txt", 1).unwrap();
        assert_eq!(
            results[0].metadata.get("type").map(String::as_str),
            Some("task_completion")
        );
    }
}
