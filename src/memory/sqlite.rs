//! SQLite 长期记忆
//!
//! 单文件库，记录追加写入（并发 save 不冲突）；检索时取出候选行后在进程内按
//! 关键词重叠打分排序。rusqlite 为同步接口，连接以 Mutex 保护。

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::core::AgentError;
use crate::memory::{MemoryRecord, MemoryStore};

/// 检索时从库中拉取的候选行数上限
const CANDIDATE_LIMIT: usize = 500;

fn tokenize_lower(s: &str) -> HashSet<String> {
    s.split_whitespace()
        .map(|w| w.to_lowercase())
        .filter(|w| w.len() > 1)
        .collect()
}

/// SQLite 持久化记忆：metadata 以 JSON 列存储
pub struct SqliteMemory {
    conn: Mutex<Connection>,
}

impl SqliteMemory {
    /// 打开（或创建）数据库文件并确保表结构存在
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AgentError> {
        let conn = Connection::open(path.as_ref())
            .map_err(|e| AgentError::MemoryUnavailable(e.to_string()))?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS memories (
                id TEXT PRIMARY KEY,
                text TEXT NOT NULL,
                metadata TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
            [],
        )
        .map_err(|e| AgentError::MemoryUnavailable(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// 内存库（测试用）
    pub fn open_in_memory() -> Result<Self, AgentError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AgentError::MemoryUnavailable(e.to_string()))?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS memories (
                id TEXT PRIMARY KEY,
                text TEXT NOT NULL,
                metadata TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
            [],
        )
        .map_err(|e| AgentError::MemoryUnavailable(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl MemoryStore for SqliteMemory {
    fn save(&self, text: &str, metadata: HashMap<String, String>) -> Result<Uuid, AgentError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AgentError::MemoryUnavailable("empty text".to_string()));
        }
        let id = Uuid::new_v4();
        let meta_json = serde_json::to_string(&metadata)
            .map_err(|e| AgentError::MemoryUnavailable(e.to_string()))?;
        let conn = self
            .conn
            .lock()
            .map_err(|e| AgentError::MemoryUnavailable(e.to_string()))?;
        conn.execute(
            "INSERT INTO memories (id, text, metadata, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![id.to_string(), text, meta_json, Utc::now().to_rfc3339()],
        )
        .map_err(|e| AgentError::MemoryUnavailable(e.to_string()))?;
        Ok(id)
    }

    fn query(&self, text: &str, k: usize) -> Result<Vec<MemoryRecord>, AgentError> {
        let query_tokens = tokenize_lower(text);
        if query_tokens.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self
            .conn
            .lock()
            .map_err(|e| AgentError::MemoryUnavailable(e.to_string()))?;
        let mut stmt = conn
            .prepare(
                "SELECT text, metadata, created_at FROM memories
                 ORDER BY created_at DESC LIMIT ?1",
            )
            .map_err(|e| AgentError::MemoryUnavailable(e.to_string()))?;
        let rows = stmt
            .query_map(params![CANDIDATE_LIMIT as i64], |row| {
                let text: String = row.get(0)?;
                let meta_json: String = row.get(1)?;
                let created_at: String = row.get(2)?;
                Ok((text, meta_json, created_at))
            })
            .map_err(|e| AgentError::MemoryUnavailable(e.to_string()))?;

        let mut scored: Vec<(usize, MemoryRecord)> = Vec::new();
        for row in rows {
            let (text, meta_json, created_at) =
                row.map_err(|e| AgentError::MemoryUnavailable(e.to_string()))?;
            let score = query_tokens
                .intersection(&tokenize_lower(&text))
                .count();
            if score == 0 {
                continue;
            }
            let metadata: HashMap<String, String> =
                serde_json::from_str(&meta_json).unwrap_or_default();
            let created_at = chrono::DateTime::parse_from_rfc3339(&created_at)
                .map(|t| t.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now());
            scored.push((
                score,
                MemoryRecord {
                    text,
                    metadata,
                    created_at,
                },
            ));
        }
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(scored.into_iter().take(k).map(|(_, r)| r).collect())
    }
}
