//! 沙箱文件系统工具
//!
//! SafeFs 绑定 root_dir，所有路径必须解析到 root 下（禁止 ../ 逃逸）；
//! WriteFileTool / ReadFileTool 基于 SafeFs 提供 write_file / read_file 能力。

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;

use crate::core::AgentError;
use crate::tools::Tool;

/// 沙箱文件系统：绑定根目录，resolve 校验路径在根下，防止路径逃逸
#[derive(Debug, Clone)]
pub struct SafeFs {
    root_dir: PathBuf,
}

impl SafeFs {
    pub fn new(root_dir: impl AsRef<Path>) -> Self {
        let root = root_dir.as_ref().to_path_buf();
        let root_dir = root.canonicalize().unwrap_or(root);
        Self { root_dir }
    }

    /// 解析已存在的路径并检查在沙箱内
    pub fn resolve(&self, path: &str) -> Result<PathBuf, AgentError> {
        let path = path.trim_start_matches("./");
        let full = self.root_dir.join(path);
        let canonical = full
            .canonicalize()
            .map_err(|_| AgentError::ToolExecutionFailed(format!("Path not found: {}", path)))?;
        self.check_inside(&canonical, path)?;
        Ok(canonical)
    }

    /// 解析写入目标路径（文件可以尚不存在，校验其父目录在沙箱内）。
    /// 包含性检查先于任何目录创建：拒绝的路径不得在沙箱外留下副作用。
    pub fn resolve_for_write(&self, path: &str) -> Result<PathBuf, AgentError> {
        let path = path.trim_start_matches("./");
        if path.is_empty() {
            return Err(AgentError::ToolExecutionFailed("Empty path".to_string()));
        }
        let rel = Path::new(path);
        if rel.is_absolute()
            || rel
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(AgentError::PathEscape(path.to_string()));
        }
        let full = self.root_dir.join(rel);
        let parent = full
            .parent()
            .ok_or_else(|| AgentError::ToolExecutionFailed(format!("No parent dir: {}", path)))?;
        std::fs::create_dir_all(parent)
            .map_err(|e| AgentError::ToolExecutionFailed(format!("Mkdir failed: {}", e)))?;
        let parent_canon = parent
            .canonicalize()
            .map_err(|e| AgentError::ToolExecutionFailed(format!("Resolve failed: {}", e)))?;
        // 符号链接兜底：父目录解析后仍须在沙箱内
        self.check_inside(&parent_canon, path)?;
        Ok(parent_canon.join(full.file_name().unwrap_or_default()))
    }

    fn check_inside(&self, canonical: &Path, raw: &str) -> Result<(), AgentError> {
        let root_canon = self
            .root_dir
            .canonicalize()
            .unwrap_or_else(|_| self.root_dir.clone());
        if canonical.starts_with(root_canon) {
            Ok(())
        } else {
            Err(AgentError::PathEscape(raw.to_string())) // 如 ../../etc/passwd
        }
    }

    pub fn read_file(&self, path: &str) -> Result<String, AgentError> {
        let resolved = self.resolve(path)?;
        std::fs::read_to_string(&resolved)
            .map_err(|e| AgentError::ToolExecutionFailed(format!("Read failed: {}", e)))
    }

    pub fn write_file(&self, path: &str, content: &str) -> Result<(), AgentError> {
        let resolved = self.resolve_for_write(path)?;
        std::fs::write(&resolved, content)
            .map_err(|e| AgentError::ToolExecutionFailed(format!("Write failed: {}", e)))
    }
}

/// write_file 工具：写入（或覆盖）沙箱内文件
pub struct WriteFileTool {
    fs: SafeFs,
}

impl WriteFileTool {
    pub fn new(root_dir: impl AsRef<Path>) -> Self {
        Self {
            fs: SafeFs::new(root_dir),
        }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write (or overwrite) a file inside the workspace. Args: {\"path\": \"relative path\", \"content\": \"file content\"}"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "File path relative to workspace" },
                "content": { "type": "string", "description": "Full file content" }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let path = args.get("path").and_then(|v| v.as_str()).unwrap_or("");
        let content = args.get("content").and_then(|v| v.as_str()).unwrap_or("");
        if path.is_empty() {
            return Err("Missing 'path' argument".to_string());
        }
        tracing::info!(path = %path, bytes = content.len(), "write_file tool execute");
        self.fs
            .write_file(path, content)
            .map_err(|e| e.to_string())?;
        Ok(format!("Wrote {} bytes to '{}'", content.len(), path))
    }
}

/// read_file 工具：读取沙箱内文件内容
pub struct ReadFileTool {
    fs: SafeFs,
}

impl ReadFileTool {
    pub fn new(root_dir: impl AsRef<Path>) -> Self {
        Self {
            fs: SafeFs::new(root_dir),
        }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read file contents. Args: {\"path\": \"file path relative to workspace\"}"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "File path relative to workspace" }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let path = args.get("path").and_then(|v| v.as_str()).unwrap_or("");
        tracing::info!(path = %path, "read_file tool execute");
        self.fs.read_file(path).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let write = WriteFileTool::new(dir.path());
        let read = ReadFileTool::new(dir.path());

        let out = write
            .execute(serde_json::json!({"path": "hello.txt", "content": "hi"}))
            .await
            .unwrap();
        assert!(out.contains("hello.txt"));

        let content = read
            .execute(serde_json::json!({"path": "hello.txt"}))
            .await
            .unwrap();
        assert_eq!(content, "hi");
    }

    #[tokio::test]
    async fn test_write_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let write = WriteFileTool::new(dir.path());
        write
            .execute(serde_json::json!({"path": "a/b/c.txt", "content": "nested"}))
            .await
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join("a/b/c.txt")).unwrap(),
            "nested"
        );
    }

    #[tokio::test]
    async fn test_path_escape_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let write = WriteFileTool::new(dir.path());
        let err = write
            .execute(serde_json::json!({"path": "../escape.txt", "content": "nope"}))
            .await
            .unwrap_err();
        assert!(err.contains("escape") || err.contains("Path"));
    }

    #[tokio::test]
    async fn test_rejected_escape_leaves_no_outside_dirs() {
        let outer = tempfile::tempdir().unwrap();
        let root = outer.path().join("ws");
        std::fs::create_dir_all(&root).unwrap();
        let write = WriteFileTool::new(&root);

        let err = write
            .execute(serde_json::json!({"path": "../leaked/deep/x.txt", "content": "nope"}))
            .await
            .unwrap_err();
        assert!(err.contains("escape"));
        // 拒绝的写入不得在沙箱外创建目录
        assert!(!outer.path().join("leaked").exists());
    }

    #[tokio::test]
    async fn test_absolute_path_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let write = WriteFileTool::new(dir.path());
        let err = write
            .execute(serde_json::json!({"path": "/tmp/outside.txt", "content": "nope"}))
            .await
            .unwrap_err();
        assert!(err.contains("escape"));
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let read = ReadFileTool::new(dir.path());
        let err = read
            .execute(serde_json::json!({"path": "missing.txt"}))
            .await
            .unwrap_err();
        assert!(err.contains("not found") || err.contains("Path"));
    }
}
