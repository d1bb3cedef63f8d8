//! Storage module for tsp
//!
//! - `db`: SQLite - 태스크 큐 (단일 진실 공급원)
//! - `json`: JSON - 설정 파일 저장/로드

mod db;
mod json;

// SQLite Storage (태스크 큐)
pub use db::TaskStore;

// JSON Storage (설정)
pub use json::JsonStore;
