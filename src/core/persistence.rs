//! 任务持久化
//!
//! 将任务（含 turn_history 与终态）写入/从 JSON 文件加载，每个任务一个文件，
//! 供跨进程审计与恢复（可选使用）。

use std::path::{Path, PathBuf};

use crate::core::Task;

/// 简单的文件持久化：目录下每任务一个 `<task_id>.json`
#[derive(Debug, Clone)]
pub struct TaskPersistence {
    dir: PathBuf,
}

impl TaskPersistence {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// 将任务写入 `<dir>/<task_id>.json`；目录不存在时自动创建
    pub fn save(&self, task: &Task) -> anyhow::Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(format!("{}.json", task.id));
        std::fs::write(&path, serde_json::to_string_pretty(task)?)?;
        Ok(path)
    }

    /// 按任务 id 加载；文件不存在时返回 None
    pub fn load(&self, id: &uuid::Uuid) -> anyhow::Result<Option<Task>> {
        let path = self.dir.join(format!("{}.json", id));
        if !path.exists() {
            return Ok(None);
        }
        let data = std::fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&data)?))
    }
}
