//! Iteration executors
//!
//! The controller delegates each cycle's actual work to an IterationExecutor.
//! CommandExecutor shells out to a configured command; MockExecutor replays a
//! scripted sequence of outcomes for tests.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use tokio::process::Command;

use crate::domain::IterationSignal;
use crate::error::{LooprunError, Result};
use crate::state::LoopState;

/// Performs one unit of external work per loop cycle.
///
/// `Err(LooprunError::Executor)` is a recoverable failure and counts toward
/// the consecutive-failure streak; any other error is treated as a
/// system-level error and ends the run.
#[async_trait]
pub trait IterationExecutor: Send + Sync {
    async fn execute(&self, state: &LoopState) -> Result<IterationSignal>;
}

/// Runs a shell command per iteration and maps its outcome to a signal.
///
/// Exit status 0 is success; the completion marker, when configured and
/// found in stdout, marks the iteration as an explicit "done" confirmation.
/// A non-zero exit is a failure; a command timeout is a failure too, not a
/// system error, since the next iteration may well succeed.
pub struct CommandExecutor {
    command: String,
    workdir: PathBuf,
    command_timeout: Option<Duration>,
    completion_marker: Option<String>,
}

impl CommandExecutor {
    pub fn new(command: impl Into<String>, workdir: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            workdir: workdir.into(),
            command_timeout: None,
            completion_marker: None,
        }
    }

    /// Cap the runtime of each command invocation
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = Some(timeout);
        self
    }

    /// Treat an iteration whose stdout contains `marker` as a completion
    /// confirmation
    pub fn with_completion_marker(mut self, marker: impl Into<String>) -> Self {
        self.completion_marker = Some(marker.into());
        self
    }

    async fn run_command(&self) -> Result<std::process::Output> {
        let child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .current_dir(&self.workdir)
            .output();

        match self.command_timeout {
            Some(limit) => tokio::time::timeout(limit, child)
                .await
                .map_err(|_| LooprunError::Executor(format!("command timed out after {:?}", limit)))?
                .map_err(|e| LooprunError::System(format!("failed to spawn command: {}", e))),
            None => child
                .await
                .map_err(|e| LooprunError::System(format!("failed to spawn command: {}", e))),
        }
    }
}

#[async_trait]
impl IterationExecutor for CommandExecutor {
    async fn execute(&self, state: &LoopState) -> Result<IterationSignal> {
        debug!("iteration {}: running '{}'", state.iteration + 1, self.command);
        let output = self.run_command().await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = format!(
                "command exited {}: {}",
                output.status.code().map_or("signal".to_string(), |c| c.to_string()),
                stderr.trim()
            );
            return Ok(IterationSignal::failure(reason));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut signal = IterationSignal::success();
        if let Some(marker) = &self.completion_marker
            && stdout.contains(marker.as_str())
        {
            signal = signal.completed();
        }
        Ok(signal)
    }
}

/// Test executor that replays a scripted sequence of outcomes
#[derive(Default)]
pub struct MockExecutor {
    script: std::sync::Mutex<std::collections::VecDeque<Result<IterationSignal>>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the next outcome to return
    pub fn push(&self, outcome: Result<IterationSignal>) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(outcome);
        }
    }

    /// Queue `count` copies of a signal
    pub fn push_repeated(&self, signal: IterationSignal, count: usize) {
        for _ in 0..count {
            self.push(Ok(signal.clone()));
        }
    }

    /// Number of outcomes not yet consumed
    pub fn remaining(&self) -> usize {
        self.script.lock().map(|s| s.len()).unwrap_or(0)
    }
}

#[async_trait]
impl IterationExecutor for MockExecutor {
    async fn execute(&self, _state: &LoopState) -> Result<IterationSignal> {
        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        // An exhausted script keeps succeeding so limit conditions can fire
        next.unwrap_or_else(|| Ok(IterationSignal::success()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_command_success() {
        let temp = TempDir::new().unwrap();
        let executor = CommandExecutor::new("true", temp.path());
        let signal = executor.execute(&LoopState::new()).await.unwrap();
        assert!(signal.success);
        assert!(!signal.completed);
    }

    #[tokio::test]
    async fn test_command_failure_carries_stderr() {
        let temp = TempDir::new().unwrap();
        let executor = CommandExecutor::new("echo boom >&2; exit 3", temp.path());
        let signal = executor.execute(&LoopState::new()).await.unwrap();
        assert!(!signal.success);
        let reason = signal.failure_reason.unwrap();
        assert!(reason.contains("exited 3"));
        assert!(reason.contains("boom"));
    }

    #[tokio::test]
    async fn test_completion_marker_in_stdout() {
        let temp = TempDir::new().unwrap();
        let executor =
            CommandExecutor::new("echo ALL TESTS PASS", temp.path()).with_completion_marker("ALL TESTS PASS");
        let signal = executor.execute(&LoopState::new()).await.unwrap();
        assert!(signal.success);
        assert!(signal.completed);
    }

    #[tokio::test]
    async fn test_marker_absent_is_plain_success() {
        let temp = TempDir::new().unwrap();
        let executor = CommandExecutor::new("echo still going", temp.path()).with_completion_marker("DONE");
        let signal = executor.execute(&LoopState::new()).await.unwrap();
        assert!(signal.success);
        assert!(!signal.completed);
    }

    #[tokio::test]
    async fn test_command_timeout_is_failure() {
        let temp = TempDir::new().unwrap();
        let executor =
            CommandExecutor::new("sleep 5", temp.path()).with_command_timeout(Duration::from_millis(50));
        let err = executor.execute(&LoopState::new()).await.unwrap_err();
        assert!(matches!(err, LooprunError::Executor(_)));
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_mock_replays_script_in_order() {
        let mock = MockExecutor::new();
        mock.push(Ok(IterationSignal::failure("first")));
        mock.push(Ok(IterationSignal::success().completed()));

        let state = LoopState::new();
        let first = mock.execute(&state).await.unwrap();
        assert_eq!(first.failure_reason.as_deref(), Some("first"));
        let second = mock.execute(&state).await.unwrap();
        assert!(second.completed);
        assert_eq!(mock.remaining(), 0);
    }

    #[tokio::test]
    async fn test_mock_exhausted_script_succeeds() {
        let mock = MockExecutor::new();
        let signal = mock.execute(&LoopState::new()).await.unwrap();
        assert!(signal.success);
    }

    #[tokio::test]
    async fn test_mock_propagates_errors() {
        let mock = MockExecutor::new();
        mock.push(Err(LooprunError::System("disk full".to_string())));
        let err = mock.execute(&LoopState::new()).await.unwrap_err();
        assert!(matches!(err, LooprunError::System(_)));
    }
}
