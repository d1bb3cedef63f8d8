//! Core Module - 핵심 타입
//!
//! 모든 레이어가 공유하는 태스크 데이터 타입을 정의합니다.
//!
//! ## 상태 머신
//!
//! ```text
//!   add ──▶ Pending ──▶ Running ──┬──▶ Finished
//!              ▲           │      └──▶ Failed
//!              └───────────┘
//!          (crash recovery only)
//! ```

mod types;

pub use types::{CommandOutput, RunTiming, TaskRecord, TaskStatus, RELOAD_COMMAND};
