//! run_tests 动作：在沙箱内运行测试命令
//!
//! stdout / stderr 逐行读取、按到达顺序合并为返回文本；每行同时以 info 级别写入日志，
//! 运行期间即可在终端看到测试进度。

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use crate::tools::Tool;

/// run_tests：在沙箱目录运行测试命令（默认 pytest），stdout/stderr 按到达顺序合并
pub struct RunTestsTool {
    sandbox_root: PathBuf,
    command: Vec<String>,
    timeout_secs: u64,
}

impl RunTestsTool {
    pub fn new(sandbox_root: impl AsRef<Path>) -> Self {
        Self {
            sandbox_root: sandbox_root.as_ref().to_path_buf(),
            command: vec!["pytest".to_string()],
            timeout_secs: 300,
        }
    }

    /// 替换测试命令（第一个元素为程序，其余为参数）；空命令忽略
    pub fn with_command(mut self, command: Vec<String>) -> Self {
        if !command.is_empty() {
            self.command = command;
        }
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    async fn run(&self) -> Result<(bool, String), String> {
        let (program, rest) = self
            .command
            .split_first()
            .ok_or("Test command is empty")?;
        let mut child = Command::new(program)
            .args(rest)
            .current_dir(&self.sandbox_root)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| format!("Error running tests: {}", e))?;

        let stdout = child.stdout.take().ok_or("Failed to capture stdout")?;
        let stderr = child.stderr.take().ok_or("Failed to capture stderr")?;
        let mut out_lines = BufReader::new(stdout).lines();
        let mut err_lines = BufReader::new(stderr).lines();

        let mut output = String::new();
        let (mut out_done, mut err_done) = (false, false);
        while !(out_done && err_done) {
            // next_line 可安全取消，select 不会丢行
            let line = tokio::select! {
                l = out_lines.next_line(), if !out_done => match l {
                    Ok(Some(line)) => Some(line),
                    _ => { out_done = true; None }
                },
                l = err_lines.next_line(), if !err_done => match l {
                    Ok(Some(line)) => Some(line),
                    _ => { err_done = true; None }
                },
            };
            if let Some(line) = line {
                tracing::info!(target: "run_tests", "{}", line);
                output.push_str(&line);
                output.push('\n');
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| format!("Error running tests: {}", e))?;
        Ok((status.success(), output))
    }
}

#[async_trait]
impl Tool for RunTestsTool {
    fn name(&self) -> &str {
        "run_tests"
    }

    fn description(&self) -> &str {
        "Runs pytest in the sandbox directory and returns the combined stdout/stderr. \
         Useful for checking if code passes unit tests. Args: {}"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({"type": "object", "properties": {}, "required": []})
    }

    async fn execute(&self, _args: Value) -> Result<String, String> {
        tracing::info!(command = ?self.command, "Running tests");
        let (passed, output) = tokio::time::timeout(
            tokio::time::Duration::from_secs(self.timeout_secs),
            self.run(),
        )
        .await
        .map_err(|_| format!("Test execution timed out after {}s", self.timeout_secs))??;

        Ok(if passed {
            format!("Tests Passed:\n{}", output)
        } else {
            format!("Tests Failed:\n{}", output)
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".into(), "-c".into(), script.into()]
    }

    #[tokio::test]
    async fn test_passed_and_failed_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let ok = RunTestsTool::new(dir.path()).with_command(sh("echo 1 passed"));
        let out = ok.execute(serde_json::json!({})).await.unwrap();
        assert_eq!(out, "Tests Passed:\n1 passed\n");

        let fail = RunTestsTool::new(dir.path()).with_command(sh("echo boom >&2; exit 1"));
        let out = fail.execute(serde_json::json!({})).await.unwrap();
        assert!(out.starts_with("Tests Failed:\n"));
        assert!(out.contains("boom"));
    }

    /// 收集日志输出的 writer
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_output_lines_logged_at_info() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let dir = tempfile::tempdir().unwrap();
        let tool = RunTestsTool::new(dir.path()).with_command(sh("echo collected 3 items; echo oops >&2"));
        tool.execute(serde_json::json!({})).await.unwrap();

        let logs = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(logs.contains("collected 3 items"));
        assert!(logs.contains("oops"));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let dir = tempfile::tempdir().unwrap();
        let tool = RunTestsTool::new(dir.path())
            .with_command(vec!["definitely-not-a-test-runner-xyz".into()]);
        let err = tool.execute(serde_json::json!({})).await.unwrap_err();
        assert!(err.starts_with("Error running tests:"));
    }
}
