//! Config - 통합 설정 관리
//!
//! - `tsp.rs` - TspConfig 통합 설정 (저장소 경로, 폴링 주기, 보존 기간, 알림)

mod tsp;

pub use tsp::{NotifyConfig, TspConfig, ENV_DB, ENV_LOCK, ENV_MAILTO, TSP_CONFIG_FILE};
