//! Client operations
//!
//! 사용자 프로세스는 태스크를 큐에 넣고, 조회하고, 대기 중인 태스크를 지울 뿐
//! 절대 Pending 이 아닌 상태로 전이시키지 않는다. 실행은 데몬의 몫.

use crate::daemon::{Daemon, DaemonConfig, DaemonExit};
use crate::executor::LocalExecutor;
use crate::notify::notifier_from_config;
use tracing::info;
use tsp_foundation::{Result, TaskRecord, TaskStore, TspConfig};

/// Handle used by the `tsp` front end
pub struct TaskClient {
    store: TaskStore,
    recent_limit: usize,
}

impl TaskClient {
    /// Open the configured store
    pub fn open(config: &TspConfig) -> Result<Self> {
        let store = TaskStore::open(&config.db_path)?;
        Ok(Self::new(store, config.recent_limit))
    }

    pub fn new(store: TaskStore, recent_limit: usize) -> Self {
        Self {
            store,
            recent_limit,
        }
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    pub fn add(&self, command: &str) -> Result<i64> {
        self.store.add(command)
    }

    pub fn replace(&self, command: &str) -> Result<i64> {
        self.store.replace(command)
    }

    /// Join command-line words with single spaces and queue the result
    pub fn submit<S: AsRef<str>>(&self, words: &[S], replace: bool) -> Result<i64> {
        let command = words
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join(" ");

        if replace {
            self.replace(&command)
        } else {
            self.add(&command)
        }
    }

    pub fn list_pending(&self) -> Result<(Vec<TaskRecord>, usize)> {
        self.store.list_pending()
    }

    pub fn list_finished(&self) -> Result<(Vec<TaskRecord>, usize)> {
        self.store.list_finished()
    }

    pub fn list_failed(&self) -> Result<(Vec<TaskRecord>, usize)> {
        self.store.list_failed()
    }

    /// Last `n` tasks, or the configured default when `None`
    pub fn list_recent(&self, n: Option<usize>) -> Result<(Vec<TaskRecord>, usize)> {
        self.store.most_recent(n.unwrap_or(self.recent_limit))
    }

    pub fn get(&self, id: i64) -> Result<TaskRecord> {
        self.store.get(id)
    }

    pub fn purge_pending(&self) -> Result<usize> {
        self.store.purge_pending()
    }
}

/// Build the daemon from configuration and run it until reload
pub async fn run_daemon(config: &TspConfig) -> Result<DaemonExit> {
    let store = TaskStore::open(&config.db_path)?;
    let executor = LocalExecutor::with_timeout_policy(config.task_timeout().into());
    let notifier = notifier_from_config(&config.notify);

    info!(
        db = %config.db_path.display(),
        lock = %config.lock_path.display(),
        "Starting daemon"
    );

    let daemon = Daemon::new(
        store,
        Box::new(executor),
        notifier,
        DaemonConfig::from(config),
    );
    daemon.run().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tsp_foundation::{Error, TaskStatus};

    fn client() -> TaskClient {
        TaskClient::new(TaskStore::in_memory().unwrap(), 2)
    }

    #[test]
    fn test_submit_joins_words() {
        let client = client();

        let id = client.submit(&["make", "-C", "build"], false).unwrap();
        let task = client.get(id).unwrap();
        assert_eq!(task.command, "make -C build");
        assert_eq!(task.status, TaskStatus::Pending);
    }

    #[test]
    fn test_submit_replace_keeps_single_copy() {
        let client = client();

        client.submit(&["backup", "home"], false).unwrap();
        client.submit(&["backup", "home"], false).unwrap();
        let id = client.submit(&["backup", "home"], true).unwrap();

        let (pending, count) = client.list_pending().unwrap();
        assert_eq!(count, 1);
        assert_eq!(pending[0].id, id);
    }

    #[test]
    fn test_empty_submit_rejected() {
        let client = client();

        let words: [&str; 0] = [];
        let err = client.submit(&words, false).unwrap_err();
        assert!(matches!(err, Error::InvalidCommand(_)));
    }

    #[test]
    fn test_list_recent_default_limit() {
        let client = client();
        for cmd in ["a", "b", "c"] {
            client.add(cmd).unwrap();
        }

        let (recent, count) = client.list_recent(None).unwrap();
        assert_eq!(count, 2);
        assert_eq!(recent[0].command, "b");
        assert_eq!(recent[1].command, "c");

        let (_, count) = client.list_recent(Some(10)).unwrap();
        assert_eq!(count, 3);
    }

    #[test]
    fn test_get_missing() {
        let client = client();
        assert!(matches!(client.get(42), Err(Error::NotFound(42))));
    }
}
