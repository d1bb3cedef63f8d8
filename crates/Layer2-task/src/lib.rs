//! # tsp-task
//!
//! Task execution system for tsp.
//!
//! ## Features
//!
//! - Local execution without a shell, with captured output and CPU timing
//! - Singleton daemon loop (flock), crash recovery and retention sweep
//! - Notifications after every state change (mail, log, or none)
//! - Client operations used by the `tsp` front end

pub mod client;
pub mod daemon;
pub mod executor;
pub mod lock;
pub mod notify;

// Client
pub use client::{run_daemon, TaskClient};

// Daemon
pub use daemon::{Daemon, DaemonConfig, DaemonExit, StartupReport, Step, TaskOutcome};
pub use lock::SingletonLock;

// Execution
pub use executor::{Executor, LocalExecutor, RunClock, TimeoutPolicy};

// Notification
pub use notify::{
    notifier_from_config, LogNotifier, MailNotifier, Notification, Notifier, NullNotifier,
};
