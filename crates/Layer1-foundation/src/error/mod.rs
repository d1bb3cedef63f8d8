//! Error types for tsp
//!
//! 모든 에러를 중앙에서 관리

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// tsp 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // 클라이언트 입력 관련
    // ========================================================================
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Task not found: {0}")]
    NotFound(i64),

    // ========================================================================
    // 상태 머신 관련
    // ========================================================================
    #[error("Invalid state transition for task {id}: {from} -> {to}")]
    InvalidState {
        id: i64,
        from: String,
        to: String,
    },

    // ========================================================================
    // 실행 관련
    // ========================================================================
    #[error("Executable not found: {0}")]
    ExecutableNotFound(String),

    #[error("Failed to spawn process: {0}")]
    Spawn(String),

    #[error("Task timed out after {:.1}s", .0.as_secs_f64())]
    Timeout(Duration),

    // ========================================================================
    // 저장소 / 데몬 관련
    // ========================================================================
    #[error("Task store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("tsp daemon is already running (lock held: {})", .0.display())]
    LockHeld(PathBuf),

    // ========================================================================
    // 설정 / 알림
    // ========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Notification error: {0}")]
    Notify(String),

    // ========================================================================
    // 외부 에러 변환
    // ========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    // ========================================================================
    // 기타
    // ========================================================================
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// 태스크 단위로 처리되어 `Failed` 로 기록되는 에러인지 확인
    pub fn is_task_failure(&self) -> bool {
        matches!(
            self,
            Error::InvalidCommand(_)
                | Error::ExecutableNotFound(_)
                | Error::Spawn(_)
                | Error::Timeout(_)
        )
    }

    /// 데몬을 종료시켜야 하는 에러인지 확인
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::StoreUnavailable(_)
                | Error::Sqlite(_)
                | Error::LockHeld(_)
                | Error::InvalidState { .. }
                | Error::Internal(_)
        )
    }

    /// 사용자에게 보여줄 수 있는 에러인지 확인
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Error::InvalidCommand(_) | Error::NotFound(_) | Error::LockHeld(_)
        )
    }

    /// 상태 전이 에러 생성 헬퍼
    pub fn invalid_state(id: i64, from: impl Into<String>, to: impl Into<String>) -> Self {
        Error::InvalidState {
            id,
            from: from.into(),
            to: to.into(),
        }
    }

    /// 저장소 에러를 문맥과 함께 `StoreUnavailable` 로 감싸는 클로저
    pub fn store(context: &'static str) -> impl FnOnce(rusqlite::Error) -> Error {
        move |e| Error::StoreUnavailable(format!("{}: {}", context, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_failures_are_not_fatal() {
        let errors = [
            Error::ExecutableNotFound("nope".into()),
            Error::Spawn("permission denied".into()),
            Error::Timeout(Duration::from_secs(3)),
            Error::InvalidCommand("empty".into()),
        ];
        for e in errors {
            assert!(e.is_task_failure(), "{e}");
            assert!(!e.is_fatal(), "{e}");
        }
    }

    #[test]
    fn test_store_and_lock_errors_are_fatal() {
        assert!(Error::StoreUnavailable("disk gone".into()).is_fatal());
        assert!(Error::LockHeld(PathBuf::from("/tmp/tsp.lock")).is_fatal());
        assert!(Error::invalid_state(1, "finished", "running").is_fatal());
    }

    #[test]
    fn test_user_facing_errors() {
        assert!(Error::InvalidCommand("empty".into()).is_user_facing());
        assert!(Error::NotFound(4).is_user_facing());
        assert!(Error::LockHeld(PathBuf::from("/tmp/tsp.lock")).is_user_facing());
        assert!(!Error::StoreUnavailable("disk gone".into()).is_user_facing());
        assert!(!Error::Timeout(Duration::from_secs(1)).is_user_facing());
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            Error::invalid_state(7, "finished", "running").to_string(),
            "Invalid state transition for task 7: finished -> running"
        );
        assert_eq!(Error::NotFound(3).to_string(), "Task not found: 3");
        assert_eq!(
            Error::Timeout(Duration::from_millis(1500)).to_string(),
            "Task timed out after 1.5s"
        );
    }
}
