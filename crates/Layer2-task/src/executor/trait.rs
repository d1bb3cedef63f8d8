//! Executor trait

use async_trait::async_trait;
use tsp_foundation::{CommandOutput, Result};

/// Executor trait - implement to add new execution backends
///
/// An `Err` means the command could not be run at all; a process that ran and
/// exited non-zero is still `Ok`.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Run a command line to completion
    async fn execute(&self, command: &str) -> Result<CommandOutput>;

    /// Get executor name
    fn name(&self) -> &'static str;
}
