//! Daemon - the single consumer of the task queue
//!
//! Flow:
//! 1. `SingletonLock` 획득 (실패 시 `LockHeld` 로 즉시 종료)
//! 2. 크래시 복구: Running → Pending (리셋된 태스크가 있으면 알림)
//! 3. 보존 기간 정리: 오래된 태스크 삭제
//! 4. 폴링 루프: 가장 오래된 Pending 태스크를 하나씩 실행
//!
//! 태스크 단위 에러(실행 파일 없음, spawn 실패, 타임아웃)는 해당 태스크를 `Failed` 로
//! 기록하고 계속 진행한다. 저장소 에러와 상태 머신 위반은 루프 밖으로 전파되어
//! 데몬을 종료시킨다.

use crate::executor::{Executor, RunClock};
use crate::lock::SingletonLock;
use crate::notify::{Notification, Notifier};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tsp_foundation::{
    CommandOutput, Error, Result, RunTiming, TaskRecord, TaskStore, TspConfig,
};

/// Configuration for the daemon loop
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Singleton lock file
    pub lock_path: PathBuf,

    /// Sleep between polls of an empty queue
    pub poll_interval: Duration,

    /// Tasks added longer ago than this are removed at startup
    pub retention: Duration,
}

impl DaemonConfig {
    pub fn new(lock_path: impl Into<PathBuf>) -> Self {
        Self {
            lock_path: lock_path.into(),
            poll_interval: Duration::from_secs(1),
            retention: Duration::from_secs(7 * 86_400),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

impl From<&TspConfig> for DaemonConfig {
    fn from(config: &TspConfig) -> Self {
        Self {
            lock_path: config.lock_path.clone(),
            poll_interval: config.poll_interval(),
            retention: config.retention(),
        }
    }
}

/// Why `run` returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonExit {
    /// The `reload` sentinel was processed; an external supervisor restarts us
    Reload,
}

/// Result of one poll-loop iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Queue was empty
    Idle,
    Finished(i64),
    Failed(i64),
    Reload(i64),
    /// The row was deleted while the task ran; its result was dropped
    Removed(i64),
}

/// Expected per-task result, kept apart from fatal errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The process ran; any exit code
    Completed(CommandOutput),
    /// The process could not be run
    Failed(String),
}

/// Startup housekeeping summary
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StartupReport {
    pub reset: usize,
    pub purged: usize,
}

/// Single-worker queue consumer
pub struct Daemon {
    store: TaskStore,
    executor: Box<dyn Executor>,
    notifier: Box<dyn Notifier>,
    config: DaemonConfig,
}

impl Daemon {
    pub fn new(
        store: TaskStore,
        executor: Box<dyn Executor>,
        notifier: Box<dyn Notifier>,
        config: DaemonConfig,
    ) -> Self {
        Self {
            store,
            executor,
            notifier,
            config,
        }
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    pub fn config(&self) -> &DaemonConfig {
        &self.config
    }

    /// Lock, recover, sweep, then drain the queue until a `reload` task
    pub async fn run(&self) -> Result<DaemonExit> {
        let lock = SingletonLock::acquire(&self.config.lock_path)?;
        info!(
            pid = std::process::id(),
            executor = self.executor.name(),
            notifier = self.notifier.name(),
            "tsp daemon started"
        );

        self.startup(&lock).await?;

        loop {
            match self.process_next(&lock).await? {
                Step::Idle => tokio::time::sleep(self.config.poll_interval).await,
                Step::Reload(_) => {
                    info!("Reloading.");
                    return Ok(DaemonExit::Reload);
                }
                Step::Finished(_) | Step::Failed(_) | Step::Removed(_) => {}
            }
        }
    }

    /// Crash recovery and retention sweep; runs once per daemon start
    pub async fn startup(&self, _lock: &SingletonLock) -> Result<StartupReport> {
        let reset = self.store.reset_stuck_running()?;
        if reset > 0 {
            warn!(reset, "Tasks left running by a previous daemon were reset");
            self.send(Notification::reset(reset)).await;
        }

        let purged = self.store.purge_older_than(self.config.retention)?;
        if purged > 0 {
            info!(purged, "Removed tasks past retention");
        }

        Ok(StartupReport { reset, purged })
    }

    /// Execute the oldest pending task, if any
    ///
    /// Requires the singleton lock so that only one process ever moves tasks
    /// out of `Pending`. Picking and claiming the task is one store
    /// transaction, so a concurrent client purge cannot remove it in between.
    pub async fn process_next(&self, _lock: &SingletonLock) -> Result<Step> {
        let clock = RunClock::start();
        let Some(task) = self.store.claim_next()? else {
            return Ok(Step::Idle);
        };

        info!(id = task.id, command = %task.command, "Running task");

        if task.is_reload() {
            self.store
                .mark_finished(task.id, &CommandOutput::default(), &RunTiming::zero())?;
            return Ok(Step::Reload(task.id));
        }

        let outcome = match self.executor.execute(&task.command).await {
            Ok(output) => TaskOutcome::Completed(output),
            Err(e) => TaskOutcome::Failed(e.to_string()),
        };
        let timing = clock.elapsed();

        self.record(&task, outcome, &timing).await
    }

    async fn record(
        &self,
        task: &TaskRecord,
        outcome: TaskOutcome,
        timing: &RunTiming,
    ) -> Result<Step> {
        match outcome {
            TaskOutcome::Completed(output) => {
                let stored = self.store.mark_finished(task.id, &output, timing);
                if let Some(step) = removed(task, stored)? {
                    return Ok(step);
                }
                info!(
                    id = task.id,
                    result = output.exit_code,
                    real = timing.real,
                    "Task finished"
                );
                self.send(Notification::finished(task, &output)).await;
                Ok(Step::Finished(task.id))
            }
            TaskOutcome::Failed(message) => {
                let stored = self.store.mark_failed(task.id, &message, timing);
                if let Some(step) = removed(task, stored)? {
                    return Ok(step);
                }
                error!(id = task.id, "Task failed: {}", message);
                self.send(Notification::failed(task, &message)).await;
                Ok(Step::Failed(task.id))
            }
        }
    }

    async fn send(&self, notification: Notification) {
        match self
            .notifier
            .notify(&notification.subject, &notification.body)
            .await
        {
            Ok(()) => debug!(subject = %notification.subject, "Notification sent"),
            Err(e) => warn!(subject = %notification.subject, "Notification failed: {}", e),
        }
    }
}

/// A task deleted from the store while it ran is skipped, not fatal
fn removed(task: &TaskRecord, result: Result<()>) -> Result<Option<Step>> {
    match result {
        Ok(()) => Ok(None),
        Err(Error::NotFound(id)) => {
            warn!(id, command = %task.command, "Task removed while running, result dropped");
            Ok(Some(Step::Removed(id)))
        }
        Err(e) => Err(e),
    }
}
