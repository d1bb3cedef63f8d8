//! # tsp-foundation
//!
//! Foundation layer for tsp, the personal task spooler:
//! - Core: 태스크 레코드, 상태, 실행 결과 타입
//! - Storage: SQLite 태스크 큐 (TaskStore), JSON 설정 저장소 (JsonStore)
//! - Config: 통합 설정 (TspConfig)
//! - Error: 에러 분류 (클라이언트 / 태스크 / 치명적)
//!
//! ## 아키텍처
//!
//! ```text
//! ┌──────────────┐   add/replace/purge   ┌─────────────────────┐
//! │ tsp clients  │ ────────────────────▶ │  TaskStore (SQLite) │
//! └──────────────┘                       └──────────┬──────────┘
//!                                                   │ next_pending / mark_*
//!                                                   ▼
//!                                        ┌─────────────────────┐
//!                                        │  daemon (tsp-task)  │
//!                                        └─────────────────────┘
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod storage;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result};

// ============================================================================
// Core (핵심 타입)
// ============================================================================
pub use core::{CommandOutput, RunTiming, TaskRecord, TaskStatus, RELOAD_COMMAND};

// ============================================================================
// Config (설정)
// ============================================================================
pub use config::{NotifyConfig, TspConfig, ENV_DB, ENV_LOCK, ENV_MAILTO, TSP_CONFIG_FILE};

// ============================================================================
// Storage (저장소)
// ============================================================================
pub use storage::{JsonStore, TaskStore};
