//! Task executors
//!
//! - `LocalExecutor` - host process execution with captured stdout/stderr
//! - `resolve` - whitespace token splitting and PATH lookup
//! - `RunClock` - wall-clock and child CPU time accounting

pub mod local;
pub mod resolve;
pub mod timing;
pub mod r#trait;

pub use local::{LocalExecutor, TimeoutPolicy};
pub use r#trait::Executor;
pub use resolve::{find_executable, find_executable_in, split_command};
pub use timing::{CpuTimes, RunClock};
