use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use warden_core::{Error, Result, TaskDefinition};

/// Outcome of one task run.
///
/// A command that starts but exits non-zero (or times out) is still a result,
/// not an error: the caller gets its output and exit code either way.
#[derive(Debug, Clone, Serialize)]
pub struct TaskResult {
    pub name: String,
    pub command: String,
    /// Stdout, then stderr on a new line if both are non-empty
    pub output: String,
    pub exit_code: i32,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

/// Trait for running task definitions.
/// Production runs a shell; tests substitute a recorder.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn run(&self, task: &TaskDefinition) -> Result<TaskResult>;
}

/// Runs tasks with `bash -c`, bounded by a timeout
#[derive(Debug, Clone)]
pub struct SystemTaskExecutor {
    shell: String,
    timeout: Duration,
}

impl SystemTaskExecutor {
    pub fn new(timeout: Duration) -> Self {
        Self {
            shell: "bash".to_string(),
            timeout,
        }
    }

    /// Use a different shell binary (it must accept `-c <command>`)
    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }
}

#[async_trait]
impl TaskExecutor for SystemTaskExecutor {
    async fn run(&self, task: &TaskDefinition) -> Result<TaskResult> {
        let started_at = Utc::now();
        let clock = Instant::now();

        tracing::info!(task = %task.name, dangerous = task.dangerous, "running task");

        let child = Command::new(&self.shell)
            .arg("-c")
            .arg(&task.command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::command_execution(&self.shell, format!("failed to spawn: {e}"), None)
            })?;

        let mut result = TaskResult {
            name: task.name.clone(),
            command: task.command.clone(),
            output: String::new(),
            exit_code: -1,
            success: false,
            error: None,
            started_at,
            duration_ms: 0,
        };

        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                result.output = combine_output(&output.stdout, &output.stderr);
                result.exit_code = output.status.code().unwrap_or(-1);
                result.success = output.status.success();
                if !result.success {
                    result.error = Some(format!("exit status: {}", output.status));
                }
            }
            Ok(Err(e)) => {
                result.error = Some(format!("failed to collect output: {e}"));
            }
            Err(_) => {
                // Dropping the future killed the child
                result.error = Some(format!("task timed out after {:?}", self.timeout));
            }
        }

        result.duration_ms = u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX);

        tracing::info!(
            task = %task.name,
            exit_code = result.exit_code,
            success = result.success,
            duration_ms = result.duration_ms,
            "task finished"
        );
        Ok(result)
    }
}

fn combine_output(stdout: &[u8], stderr: &[u8]) -> String {
    let mut output = String::from_utf8_lossy(stdout).into_owned();
    if !stderr.is_empty() {
        if !output.is_empty() {
            output.push('\n');
        }
        output.push_str(&String::from_utf8_lossy(stderr));
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(command: &str) -> TaskDefinition {
        TaskDefinition::new("t", command, "test task", false)
    }

    fn executor() -> SystemTaskExecutor {
        SystemTaskExecutor::new(Duration::from_secs(10)).with_shell("sh")
    }

    #[test]
    fn test_combine_output() {
        assert_eq!(combine_output(b"out", b""), "out");
        assert_eq!(combine_output(b"", b"err"), "err");
        assert_eq!(combine_output(b"out", b"err"), "out\nerr");
    }

    #[tokio::test]
    async fn test_successful_task() {
        let result = executor().run(&task("echo hello")).await.unwrap();
        assert!(result.success);
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.output.trim(), "hello");
        assert!(result.error.is_none());
        assert_eq!(result.name, "t");
    }

    #[tokio::test]
    async fn test_failing_task_is_a_result() {
        let result = executor()
            .run(&task("echo oops >&2; exit 3"))
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.exit_code, 3);
        assert_eq!(result.output.trim(), "oops");
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn test_timeout() {
        let executor = SystemTaskExecutor::new(Duration::from_millis(100)).with_shell("sh");
        let result = executor.run(&task("sleep 5")).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.exit_code, -1);
        assert!(result.error.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_missing_shell_is_an_error() {
        let executor =
            SystemTaskExecutor::new(Duration::from_secs(1)).with_shell("/nonexistent/shell");
        let err = executor.run(&task("true")).await.unwrap_err();
        assert_eq!(err.kind(), warden_core::ErrorKind::Internal);
    }
}
