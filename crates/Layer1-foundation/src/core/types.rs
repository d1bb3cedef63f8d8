//! Core Types - 공용 타입 정의
//!
//! 저장소, 데몬, CLI 가 공통으로 사용하는 태스크 레코드와 상태

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 데몬을 재시작시키는 예약 명령어
pub const RELOAD_COMMAND: &str = "reload";

// ============================================================================
// Task Status - 태스크 상태
// ============================================================================

/// Possible states of a queued task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting for the daemon
    Pending,

    /// Currently executing (at most one task at a time)
    Running,

    /// Process ran to completion; `result` holds its exit code
    Finished,

    /// Could not be run (resolution, spawn or timeout failure)
    Failed,
}

impl TaskStatus {
    /// Storage representation
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Finished => "finished",
            Self::Failed => "failed",
        }
    }

    /// Parse the storage representation
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "finished" => Some(Self::Finished),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Check if this is a terminal state (cannot transition further)
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Failed)
    }

    /// 허용된 전이: Pending → Running → {Finished, Failed}
    ///
    /// `Running → Pending` 은 크래시 복구 전용이며 여기서는 허용하지 않는다.
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Running, Self::Finished)
                | (Self::Running, Self::Failed)
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Run Timing - 실행 시간
// ============================================================================

/// Elapsed wall-clock and CPU time of one run, in seconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunTiming {
    pub real: f64,
    pub user: f64,
    pub sys: f64,
}

impl RunTiming {
    pub fn new(real: Duration, user: Duration, sys: Duration) -> Self {
        Self {
            real: real.as_secs_f64(),
            user: user.as_secs_f64(),
            sys: sys.as_secs_f64(),
        }
    }

    /// 실행하지 않은 태스크 (reload 등)
    pub fn zero() -> Self {
        Self::default()
    }
}

// ============================================================================
// Command Output - 실행 결과
// ============================================================================

/// Exit code and captured streams of a finished child process
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn new(exit_code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

// ============================================================================
// Task Record - 저장된 태스크
// ============================================================================

/// One row of the task table, strongly typed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: i64,
    pub added_at: DateTime<Utc>,
    pub run_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub command: String,
    pub status: TaskStatus,
    /// Exit code once terminal (`-1` when the task could not be run)
    pub result: Option<i32>,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub timing: Option<RunTiming>,
}

impl TaskRecord {
    /// Terminal and exited with code 0
    pub fn succeeded(&self) -> bool {
        self.status == TaskStatus::Finished && self.result == Some(0)
    }

    pub fn is_reload(&self) -> bool {
        self.command == RELOAD_COMMAND
    }

    /// Wall-clock time between start and finish, if both happened
    pub fn duration(&self) -> Option<chrono::Duration> {
        Some(self.finished_at? - self.run_at?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip_names() {
        for status in [
            TaskStatus::Pending,
            TaskStatus::Running,
            TaskStatus::Finished,
            TaskStatus::Failed,
        ] {
            assert_eq!(TaskStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(TaskStatus::parse("done"), None);
    }

    #[test]
    fn test_allowed_transitions() {
        use TaskStatus::*;
        assert!(Pending.can_transition_to(Running));
        assert!(Running.can_transition_to(Finished));
        assert!(Running.can_transition_to(Failed));

        assert!(!Pending.can_transition_to(Finished));
        assert!(!Finished.can_transition_to(Running));
        assert!(!Failed.can_transition_to(Pending));
        assert!(!Running.can_transition_to(Pending));
        assert!(Finished.is_terminal() && Failed.is_terminal());
    }

    #[test]
    fn test_timing_from_durations() {
        let timing = RunTiming::new(
            Duration::from_millis(1500),
            Duration::from_millis(250),
            Duration::ZERO,
        );
        assert_eq!(timing.real, 1.5);
        assert_eq!(timing.user, 0.25);
        assert_eq!(timing.sys, 0.0);
    }
}
