//! Tsp Config - 통합 설정
//!
//! 로드 순서: 기본값 → `~/.config/tsp/config.json` → 환경 변수 → CLI 플래그

use crate::storage::JsonStore;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// 설정 파일명
pub const TSP_CONFIG_FILE: &str = "config.json";

/// 메일 수신자 환경 변수
pub const ENV_MAILTO: &str = "TS_MAILTO";
/// 태스크 DB 경로 환경 변수
pub const ENV_DB: &str = "TSP_DB";
/// 락 파일 경로 환경 변수
pub const ENV_LOCK: &str = "TSP_LOCK";

// ============================================================================
// Tsp Config (통합)
// ============================================================================

/// tsp 통합 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TspConfig {
    /// 태스크 저장소 파일
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// 데몬 싱글톤 락 파일
    #[serde(default = "default_lock_path")]
    pub lock_path: PathBuf,

    /// 큐가 비었을 때 대기 시간
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// 이 기간보다 오래된 태스크는 데몬 시작 시 삭제
    #[serde(default = "default_retention_days")]
    pub retention_days: u64,

    /// `list_recent` 기본 개수
    #[serde(default = "default_recent_limit")]
    pub recent_limit: usize,

    /// 태스크 실행 제한 시간 (없으면 무제한)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_timeout_secs: Option<u64>,

    /// 알림 설정
    #[serde(default)]
    pub notify: NotifyConfig,
}

impl Default for TspConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            lock_path: default_lock_path(),
            poll_interval_ms: default_poll_interval_ms(),
            retention_days: default_retention_days(),
            recent_limit: default_recent_limit(),
            task_timeout_secs: None,
            notify: NotifyConfig::default(),
        }
    }
}

impl TspConfig {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Load / Save
    // ========================================================================

    /// 글로벌 설정 파일 + 환경 변수
    pub fn load() -> Result<Self> {
        let mut config = match JsonStore::global() {
            Ok(store) => Self::load_from(&store)?,
            Err(_) => Self::new(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// 지정한 저장소에서 로드 (파일이 없으면 기본값)
    pub fn load_from(store: &JsonStore) -> Result<Self> {
        Ok(store
            .load_optional::<TspConfig>(TSP_CONFIG_FILE)?
            .unwrap_or_default())
    }

    /// 환경 변수 덮어쓰기
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(path) = non_empty(ENV_DB) {
            self.db_path = PathBuf::from(path);
        }
        if let Some(path) = non_empty(ENV_LOCK) {
            self.lock_path = PathBuf::from(path);
        }
        if let Some(to) = non_empty(ENV_MAILTO) {
            self.notify.mail_to = Some(to);
        }
    }

    // ========================================================================
    // Derived values
    // ========================================================================

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_days.saturating_mul(86_400))
    }

    pub fn task_timeout(&self) -> Option<Duration> {
        self.task_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    // ========================================================================
    // Builder
    // ========================================================================

    pub fn db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = path.into();
        self
    }

    pub fn lock_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.lock_path = path.into();
        self
    }

    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }
}

// ============================================================================
// Notify Config
// ============================================================================

/// 알림(메일) 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifyConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// 수신자 (없으면 로그로만 남김)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mail_to: Option<String>,

    #[serde(default = "default_mail_from")]
    pub mail_from: String,

    /// `-t` 옵션으로 실행되는 sendmail 호환 프로그램
    #[serde(default = "default_sendmail")]
    pub sendmail: PathBuf,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mail_to: None,
            mail_from: default_mail_from(),
            sendmail: default_sendmail(),
        }
    }
}

// ============================================================================
// Defaults
// ============================================================================

fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tsp")
        .join("tasks.db")
}

fn default_lock_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("tsp.lock")
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_retention_days() -> u64 {
    7
}

fn default_recent_limit() -> usize {
    50
}

fn default_true() -> bool {
    true
}

fn default_mail_from() -> String {
    "tsp@localhost".to_string()
}

fn default_sendmail() -> PathBuf {
    PathBuf::from("/usr/sbin/sendmail")
}
