//! Local executor - runs a command on the host and captures its output
//!
//! Features:
//! - No shell: whitespace token splitting + PATH resolution
//! - Full stdout/stderr capture (lossy UTF-8)
//! - Exit code tracking (`-1` when killed by a signal)
//! - Optional hard timeout; without one the child may run forever

use crate::executor::resolve::{find_executable, split_command};
use crate::executor::Executor;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};
use tsp_foundation::{CommandOutput, Error, Result};

/// Timeout policy for task execution
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimeoutPolicy {
    /// No timeout: a hung child blocks the queue until it exits
    #[default]
    None,
    /// Hard timeout - kill immediately when exceeded
    Hard(Duration),
}

impl TimeoutPolicy {
    /// Create a hard timeout from seconds
    pub fn hard_secs(secs: u64) -> Self {
        Self::Hard(Duration::from_secs(secs))
    }

    /// Get the maximum timeout duration
    pub fn max_duration(&self) -> Option<Duration> {
        match self {
            Self::None => None,
            Self::Hard(d) => Some(*d),
        }
    }
}

impl From<Option<Duration>> for TimeoutPolicy {
    fn from(timeout: Option<Duration>) -> Self {
        timeout.map_or(Self::None, Self::Hard)
    }
}

/// Local executor that runs tasks directly on the host
#[derive(Debug, Clone, Default)]
pub struct LocalExecutor {
    timeout_policy: TimeoutPolicy,
}

impl LocalExecutor {
    /// Create a new local executor
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout_policy(timeout_policy: TimeoutPolicy) -> Self {
        Self { timeout_policy }
    }

    pub fn timeout_policy(&self) -> TimeoutPolicy {
        self.timeout_policy
    }
}

#[async_trait]
impl Executor for LocalExecutor {
    async fn execute(&self, command: &str) -> Result<CommandOutput> {
        let (program, args) = split_command(command)?;
        let resolved = find_executable(&program)?;

        let mut cmd = Command::new(&resolved);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!("Executing {} {:?}", resolved.display(), args);

        let child = cmd
            .spawn()
            .map_err(|e| Error::Spawn(format!("{}: {}", resolved.display(), e)))?;

        // Dropping the wait future on timeout drops the child, which kills it.
        let output = match self.timeout_policy.max_duration() {
            None => child.wait_with_output().await?,
            Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
                Ok(output) => output?,
                Err(_) => {
                    warn!(
                        "Command exceeded {:.1}s timeout, killing: {}",
                        limit.as_secs_f64(),
                        command
                    );
                    return Err(Error::Timeout(limit));
                }
            },
        };

        let exit_code = output.status.code().unwrap_or(-1);
        if exit_code != 0 {
            debug!("Process exited with code {}", exit_code);
        }

        Ok(CommandOutput {
            exit_code,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_executor() {
        let executor = LocalExecutor::new();
        assert_eq!(executor.name(), "local");
        assert_eq!(executor.timeout_policy(), TimeoutPolicy::None);
    }

    #[tokio::test]
    async fn test_execute_simple_command() {
        let executor = LocalExecutor::new();

        let output = executor.execute("echo hello").await.unwrap();
        assert_eq!(output.exit_code, 0);
        assert_eq!(output.stdout, "hello\n");
        assert!(output.stderr.is_empty());
    }

    #[tokio::test]
    async fn test_arguments_are_whitespace_tokens() {
        let executor = LocalExecutor::new();

        let output = executor.execute("echo   a    b").await.unwrap();
        assert_eq!(output.stdout, "a b\n");
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_ok() {
        let executor = LocalExecutor::new();

        let output = executor.execute("ls /definitely/not/here").await.unwrap();
        assert_ne!(output.exit_code, 0);
        assert!(!output.stderr.is_empty());
    }

    #[tokio::test]
    async fn test_missing_executable() {
        let executor = LocalExecutor::new();

        let err = executor.execute("/no/such/binary").await.unwrap_err();
        assert!(matches!(err, Error::ExecutableNotFound(_)));
        assert!(err.to_string().contains("Executable not found"));
    }

    #[tokio::test]
    async fn test_unspawnable_file() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("not-executable.sh");
        std::fs::write(&script, "echo nope\n").unwrap();

        let executor = LocalExecutor::new();
        let err = executor
            .execute(&script.display().to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Spawn(_)));
    }

    #[tokio::test]
    async fn test_hard_timeout_kills_child() {
        let executor = LocalExecutor::with_timeout_policy(TimeoutPolicy::Hard(
            Duration::from_millis(200),
        ));

        let started = std::time::Instant::now();
        let err = executor.execute("sleep 10").await.unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_policy_from_config_value() {
        assert_eq!(TimeoutPolicy::from(None), TimeoutPolicy::None);
        assert_eq!(
            TimeoutPolicy::from(Some(Duration::from_secs(3))),
            TimeoutPolicy::hard_secs(3)
        );
        assert_eq!(TimeoutPolicy::hard_secs(3).max_duration(), Some(Duration::from_secs(3)));
    }
}
