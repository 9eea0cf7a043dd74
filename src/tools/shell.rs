//! Shell 执行工具：白名单命令，禁止危险操作
//!
//! 仅允许配置中的命令名（首词，如 ls、grep、cargo）；禁止 rm -rf、chmod 777 等子串。
//! 执行通过 sh -c / cmd /C，带超时；超时、取消或提前退出时子进程
//! 必须在返回前被终止并回收（kill + wait），不留孤儿进程。

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::tools::Tool;

/// 禁止的命令/子串（即使白名单中有同名，也不允许带这些参数）
const FORBIDDEN_SUBSTR: &[&str] = &[
    "rm -rf",
    "rm -fr",
    "rm -r",
    "chmod 777",
    "chmod +s",
    "mkfs",
    "dd if=",
    "> /dev/sd",
    ":(){ :|:& };:", // fork bomb
];

/// run_shell_command 工具：白名单内命令在工作目录内执行，带超时与外部取消
pub struct RunShellCommandTool {
    workdir: PathBuf,
    allowed_commands: HashSet<String>,
    timeout_secs: u64,
    cancel: CancellationToken,
}

impl RunShellCommandTool {
    pub fn new(
        workdir: impl AsRef<Path>,
        allowed_commands: Vec<String>,
        timeout_secs: u64,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            workdir: workdir.as_ref().to_path_buf(),
            allowed_commands: allowed_commands
                .into_iter()
                .map(|s| s.to_lowercase())
                .collect(),
            timeout_secs,
            cancel,
        }
    }

    /// 白名单校验：首词须在 allowed_commands 内，整条命令不得含禁止子串
    fn is_allowed(&self, raw: &str) -> Result<(), String> {
        let raw_lower = raw.to_lowercase();
        for forbidden in FORBIDDEN_SUBSTR {
            if raw_lower.contains(forbidden) {
                return Err(format!("Forbidden pattern: {}", forbidden));
            }
        }
        let name = raw_lower.split_whitespace().next().unwrap_or("");
        if self.allowed_commands.contains(name) {
            Ok(())
        } else {
            Err(format!("Command '{}' not in allowlist", name))
        }
    }

    async fn run(&self, command: &str) -> Result<String, String> {
        let mut cmd = if cfg!(target_os = "windows") {
            let mut c = Command::new("cmd");
            c.args(["/C", command]);
            c
        } else {
            let mut c = Command::new("sh");
            c.args(["-c", command]);
            c
        };
        cmd.current_dir(&self.workdir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| format!("Spawn failed: {}", e))?;
        let mut stdout = child.stdout.take();
        let mut stderr = child.stderr.take();

        // 与 wait 并发读管道，避免大输出撑满缓冲导致死锁
        let read_pipes = async {
            let mut out = Vec::new();
            let mut err = Vec::new();
            if let Some(ref mut h) = stdout {
                let _ = h.read_to_end(&mut out).await;
            }
            if let Some(ref mut h) = stderr {
                let _ = h.read_to_end(&mut err).await;
            }
            (out, err)
        };

        let deadline = Duration::from_secs(self.timeout_secs);
        let waited = tokio::select! {
            _ = self.cancel.cancelled() => None,
            r = tokio::time::timeout(deadline, async {
                tokio::join!(child.wait(), read_pipes)
            }) => r.ok(),
        };

        match waited {
            Some((Ok(status), (out, err))) => {
                let stdout = String::from_utf8_lossy(&out);
                let stderr = String::from_utf8_lossy(&err);
                let mut output = format!("STDOUT:\n{}", stdout);
                if !stderr.is_empty() {
                    output.push_str(&format!("\nSTDERR:\n{}", stderr));
                }
                if !status.success() {
                    output.push_str(&format!("\nExit: {:?}", status.code()));
                }
                Ok(output)
            }
            Some((Err(e), _)) => {
                let _ = child.start_kill();
                let _ = child.wait().await; // 回收
                Err(format!("Wait failed: {}", e))
            }
            None => {
                // 超时或取消：终止并回收后再返回
                let _ = child.start_kill();
                let _ = child.wait().await;
                if self.cancel.is_cancelled() {
                    Err("Command cancelled".to_string())
                } else {
                    Err(format!("Command timed out after {}s", self.timeout_secs))
                }
            }
        }
    }
}

#[async_trait]
impl Tool for RunShellCommandTool {
    fn name(&self) -> &str {
        "run_shell_command"
    }

    fn description(&self) -> &str {
        "Run an allowlisted shell command in the workspace directory. Args: {\"command\": \"shell command line\"}"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": { "type": "string", "description": "The shell command to execute" }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let command = args
            .get("command")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .trim();
        if command.is_empty() {
            return Err("Missing 'command' argument".to_string());
        }
        self.is_allowed(command)?;
        tracing::info!(command = %command, "shell tool execute");
        self.run(command).await
    }
}

#[cfg(test)]
#[cfg(unix)]
mod tests {
    use super::*;

    fn allowed() -> Vec<String> {
        ["echo", "exit", "sleep", "ls", "touch"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn tool(dir: &Path, timeout_secs: u64) -> RunShellCommandTool {
        RunShellCommandTool::new(dir, allowed(), timeout_secs, CancellationToken::new())
    }

    #[tokio::test]
    async fn test_captures_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let out = tool(dir.path(), 10)
            .execute(serde_json::json!({"command": "echo hello"}))
            .await
            .unwrap();
        assert!(out.contains("hello"));
    }

    #[tokio::test]
    async fn test_nonzero_exit_reported() {
        let dir = tempfile::tempdir().unwrap();
        let out = tool(dir.path(), 10)
            .execute(serde_json::json!({"command": "exit 3"}))
            .await
            .unwrap();
        assert!(out.contains("Exit: Some(3)"));
    }

    #[tokio::test]
    async fn test_timeout_kills_child() {
        let dir = tempfile::tempdir().unwrap();
        // 子进程若存活到 sleep 结束会写出 marker 文件
        let cmd = "sleep 5 && touch marker.txt";
        let start = std::time::Instant::now();
        let err = tool(dir.path(), 1)
            .execute(serde_json::json!({"command": cmd}))
            .await
            .unwrap_err();
        assert!(err.contains("timed out"));
        assert!(start.elapsed() < Duration::from_secs(4));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!dir.path().join("marker.txt").exists(), "orphan survived");
    }

    #[tokio::test]
    async fn test_cancellation_kills_child() {
        let dir = tempfile::tempdir().unwrap();
        let token = CancellationToken::new();
        let shell = RunShellCommandTool::new(dir.path(), allowed(), 60, token.clone());

        let cancel_after = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            cancel_after.cancel();
        });

        let err = shell
            .execute(serde_json::json!({"command": "sleep 30"}))
            .await
            .unwrap_err();
        assert!(err.contains("cancelled"));
    }

    #[tokio::test]
    async fn test_command_not_in_allowlist_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = tool(dir.path(), 10)
            .execute(serde_json::json!({"command": "curl http://example.com"}))
            .await
            .unwrap_err();
        assert!(err.contains("not in allowlist"));
    }

    #[tokio::test]
    async fn test_forbidden_pattern_rejected_despite_allowlist() {
        let dir = tempfile::tempdir().unwrap();
        // 首词 echo 在白名单内，但整条命令含禁止子串
        let err = tool(dir.path(), 10)
            .execute(serde_json::json!({"command": "echo x && rm -rf /"}))
            .await
            .unwrap_err();
        assert!(err.contains("Forbidden pattern"));
    }

    #[tokio::test]
    async fn test_runs_in_workdir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("probe.txt"), "x").unwrap();
        let out = tool(dir.path(), 10)
            .execute(serde_json::json!({"command": "ls"}))
            .await
            .unwrap();
        assert!(out.contains("probe.txt"));
    }
}
