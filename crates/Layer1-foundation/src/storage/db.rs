//! SQLite Task Store
//!
//! 태스크 큐의 단일 진실 공급원 (single source of truth):
//! - 클라이언트는 `add` / `replace` / `purge_pending` 으로 행을 추가/삭제
//! - 데몬만이 `mark_running` / `mark_finished` / `mark_failed` 로 상태를 전이
//! - 모든 변경은 IMMEDIATE 트랜잭션 안에서 실행되고, 커밋 전에 drop 되면 롤백
//!
//! 여러 프로세스(클라이언트 + 데몬)가 같은 파일을 공유하므로 WAL 모드와
//! busy timeout 을 사용한다.

use crate::core::{CommandOutput, RunTiming, TaskRecord, TaskStatus};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info};

/// How long a connection waits for another process's write lock
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const TASK_COLUMNS: &str = "id, added_at, run_at, finished_at, command, status, result, \
                            stdout, stderr, time_real, time_user, time_sys";

/// Durable, transactional task queue
pub struct TaskStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl TaskStore {
    /// Open (or create) the store at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::StoreUnavailable(format!(
                    "Failed to create data directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let conn = Connection::open(path).map_err(Error::store("Failed to open database"))?;

        // Enable WAL mode for better concurrent performance
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(Error::store("Failed to set pragmas"))?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(Error::store("Failed to set busy timeout"))?;

        let store = Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        };
        store.initialize_schema()?;

        debug!("Opened task store at {}", path.display());
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(Error::store("Failed to create in-memory database"))?;

        let store = Self {
            conn: Mutex::new(conn),
            path: None,
        };
        store.initialize_schema()?;

        Ok(store)
    }

    /// Backing file, `None` for in-memory stores
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Internal("Lock poisoned".to_string()))
    }

    /// Idempotent bootstrap, run on every open
    fn initialize_schema(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                added_at INTEGER NOT NULL,
                run_at INTEGER,
                finished_at INTEGER,
                command TEXT NOT NULL,
                status TEXT NOT NULL CHECK(status IN ('pending', 'running', 'finished', 'failed')),
                result INTEGER,
                stdout TEXT,
                stderr TEXT,
                time_real REAL,
                time_user REAL,
                time_sys REAL
            );

            -- replace-by-command lookups
            CREATE INDEX IF NOT EXISTS idx_tasks_command ON tasks(command);

            -- next_pending / list queries
            CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status, id);
            "#,
        )
        .map_err(Error::store("Failed to initialize schema"))?;

        Ok(())
    }

    // ========================================================================
    // Client Operations
    // ========================================================================

    /// Queue a new command, returning its id
    pub fn add(&self, command: &str) -> Result<i64> {
        validate_command(command)?;

        let mut conn = self.conn()?;
        let tx = begin(&mut conn)?;
        let id = insert_pending(&tx, command)?;
        tx.commit().map_err(Error::store("Failed to commit add"))?;

        debug!(id, command, "Task added");
        Ok(id)
    }

    /// Delete every task with exactly this command text, then queue it again
    ///
    /// A task currently running is kept; it finishes normally.
    ///
    /// Both steps share one transaction.
    pub fn replace(&self, command: &str) -> Result<i64> {
        validate_command(command)?;

        let mut conn = self.conn()?;
        let tx = begin(&mut conn)?;
        // 실행 중인 태스크는 데몬 소유이므로 건드리지 않음
        let removed = tx
            .execute(
                "DELETE FROM tasks WHERE command = ?1 AND status <> ?2",
                params![command, TaskStatus::Running],
            )
            .map_err(Error::store("Failed to delete replaced tasks"))?;
        let id = insert_pending(&tx, command)?;
        tx.commit().map_err(Error::store("Failed to commit replace"))?;

        debug!(id, command, removed, "Task replaced");
        Ok(id)
    }

    /// Delete all pending tasks
    pub fn purge_pending(&self) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = begin(&mut conn)?;
        let count = tx
            .execute(
                "DELETE FROM tasks WHERE status = ?1",
                params![TaskStatus::Pending],
            )
            .map_err(Error::store("Failed to purge pending tasks"))?;
        tx.commit().map_err(Error::store("Failed to commit purge"))?;

        debug!(count, "Purged pending tasks");
        Ok(count)
    }

    // ========================================================================
    // Daemon Operations
    // ========================================================================

    /// Lowest-id pending task; read only
    pub fn next_pending(&self) -> Result<Option<TaskRecord>> {
        let conn = self.conn()?;

        conn.query_row(
            &format!(
                "SELECT {} FROM tasks WHERE status = ?1 ORDER BY id LIMIT 1",
                TASK_COLUMNS
            ),
            params![TaskStatus::Pending],
            row_to_task,
        )
        .optional()
        .map_err(Error::store("Failed to fetch next pending task"))
    }

    /// Take the lowest-id pending task and mark it Running in one transaction
    ///
    /// A client purge between picking and claiming is impossible here, unlike
    /// `next_pending` followed by `mark_running`.
    pub fn claim_next(&self) -> Result<Option<TaskRecord>> {
        let mut conn = self.conn()?;
        let tx = begin(&mut conn)?;

        let id: Option<i64> = tx
            .query_row(
                "SELECT id FROM tasks WHERE status = ?1 ORDER BY id LIMIT 1",
                params![TaskStatus::Pending],
                |row| row.get(0),
            )
            .optional()
            .map_err(Error::store("Failed to fetch next pending task"))?;
        let Some(id) = id else {
            return Ok(None);
        };

        tx.execute(
            "UPDATE tasks SET status = ?2, run_at = ?3 WHERE id = ?1 AND status = ?4",
            params![id, TaskStatus::Running, now(), TaskStatus::Pending],
        )
        .map_err(Error::store("Failed to claim task"))?;

        let task = tx
            .query_row(
                &format!("SELECT {} FROM tasks WHERE id = ?1", TASK_COLUMNS),
                params![id],
                row_to_task,
            )
            .map_err(Error::store("Failed to read claimed task"))?;
        tx.commit().map_err(Error::store("Failed to commit claim"))?;

        debug!(id, "Task claimed");
        Ok(Some(task))
    }

    /// Pending → Running
    pub fn mark_running(&self, id: i64) -> Result<()> {
        self.transition(id, TaskStatus::Running, |tx| {
            tx.execute(
                "UPDATE tasks SET status = ?2, run_at = ?3 WHERE id = ?1",
                params![id, TaskStatus::Running, now()],
            )
        })
    }

    /// Running → Finished, recording exit code, captured output and timing
    pub fn mark_finished(&self, id: i64, output: &CommandOutput, timing: &RunTiming) -> Result<()> {
        self.transition(id, TaskStatus::Finished, |tx| {
            tx.execute(
                r#"
                UPDATE tasks SET
                    status = ?2,
                    finished_at = ?3,
                    result = ?4,
                    stdout = ?5,
                    stderr = ?6,
                    time_real = ?7,
                    time_user = ?8,
                    time_sys = ?9
                WHERE id = ?1
                "#,
                params![
                    id,
                    TaskStatus::Finished,
                    now(),
                    output.exit_code,
                    output.stdout,
                    output.stderr,
                    timing.real,
                    timing.user,
                    timing.sys,
                ],
            )
        })
    }

    /// Running → Failed; `result` is -1 and the error text becomes stderr
    pub fn mark_failed(&self, id: i64, error_text: &str, timing: &RunTiming) -> Result<()> {
        self.transition(id, TaskStatus::Failed, |tx| {
            tx.execute(
                r#"
                UPDATE tasks SET
                    status = ?2,
                    finished_at = ?3,
                    result = -1,
                    stdout = NULL,
                    stderr = ?4,
                    time_real = ?5,
                    time_user = ?6,
                    time_sys = ?7
                WHERE id = ?1
                "#,
                params![
                    id,
                    TaskStatus::Failed,
                    now(),
                    error_text,
                    timing.real,
                    timing.user,
                    timing.sys,
                ],
            )
        })
    }

    /// Return every Running task to Pending (startup crash recovery)
    pub fn reset_stuck_running(&self) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = begin(&mut conn)?;
        let count = tx
            .execute(
                "UPDATE tasks SET status = ?1, run_at = NULL WHERE status = ?2",
                params![TaskStatus::Pending, TaskStatus::Running],
            )
            .map_err(Error::store("Failed to reset running tasks"))?;
        tx.commit().map_err(Error::store("Failed to commit reset"))?;

        if count > 0 {
            info!(count, "Reset stuck running tasks to pending");
        }
        Ok(count)
    }

    /// Delete tasks of any status added before `now - age`
    ///
    /// An age beyond the representable time range removes nothing.
    pub fn purge_older_than(&self, age: Duration) -> Result<usize> {
        let cutoff = chrono::Duration::from_std(age)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age));
        let Some(cutoff) = cutoff.map(|t| t.timestamp()) else {
            debug!(?age, "Retention age out of range, nothing to purge");
            return Ok(0);
        };

        let mut conn = self.conn()?;
        let tx = begin(&mut conn)?;
        let count = tx
            .execute("DELETE FROM tasks WHERE added_at < ?1", params![cutoff])
            .map_err(Error::store("Failed to purge old tasks"))?;
        tx.commit().map_err(Error::store("Failed to commit retention sweep"))?;

        debug!(count, cutoff, "Retention sweep done");
        Ok(count)
    }

    fn transition<F>(&self, id: i64, to: TaskStatus, apply: F) -> Result<()>
    where
        F: FnOnce(&Transaction<'_>) -> rusqlite::Result<usize>,
    {
        let mut conn = self.conn()?;
        let tx = begin(&mut conn)?;

        let from: TaskStatus = tx
            .query_row(
                "SELECT status FROM tasks WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()
            .map_err(Error::store("Failed to read task status"))?
            .ok_or(Error::NotFound(id))?;

        if !from.can_transition_to(to) {
            // tx dropped here -> rollback
            return Err(Error::invalid_state(id, from.as_str(), to.as_str()));
        }

        apply(&tx).map_err(Error::store("Failed to update task"))?;
        tx.commit().map_err(Error::store("Failed to commit transition"))?;

        debug!(id, %from, %to, "Task transitioned");
        Ok(())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Get a task by id
    pub fn find(&self, id: i64) -> Result<Option<TaskRecord>> {
        let conn = self.conn()?;

        conn.query_row(
            &format!("SELECT {} FROM tasks WHERE id = ?1", TASK_COLUMNS),
            params![id],
            row_to_task,
        )
        .optional()
        .map_err(Error::store("Failed to get task"))
    }

    /// Get a task by id, `NotFound` if missing
    pub fn get(&self, id: i64) -> Result<TaskRecord> {
        self.find(id)?.ok_or(Error::NotFound(id))
    }

    pub fn list_pending(&self) -> Result<(Vec<TaskRecord>, usize)> {
        self.list_where("status = 'pending'")
    }

    /// Finished with exit code 0
    pub fn list_finished(&self) -> Result<(Vec<TaskRecord>, usize)> {
        self.list_where("status = 'finished' AND result = 0")
    }

    /// Failed, or finished with a non-zero exit code
    pub fn list_failed(&self) -> Result<(Vec<TaskRecord>, usize)> {
        self.list_where("status = 'failed' OR (status = 'finished' AND result <> 0)")
    }

    /// Last `limit` tasks in chronological order
    pub fn most_recent(&self, limit: usize) -> Result<(Vec<TaskRecord>, usize)> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM tasks ORDER BY id DESC LIMIT ?1",
                TASK_COLUMNS
            ))
            .map_err(Error::store("Failed to prepare query"))?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut tasks = stmt
            .query_map(params![limit], row_to_task)
            .map_err(Error::store("Failed to query recent tasks"))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(Error::store("Failed to read recent tasks"))?;
        tasks.reverse();

        let count = tasks.len();
        Ok((tasks, count))
    }

    /// Number of tasks currently in `status`
    pub fn count_by_status(&self, status: TaskStatus) -> Result<usize> {
        let conn = self.conn()?;

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM tasks WHERE status = ?1",
                params![status],
                |row| row.get(0),
            )
            .map_err(Error::store("Failed to count tasks"))?;

        Ok(count as usize)
    }

    // Fixed predicates only; nothing user supplied reaches this string.
    fn list_where(&self, predicate: &str) -> Result<(Vec<TaskRecord>, usize)> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM tasks WHERE {} ORDER BY id",
                TASK_COLUMNS, predicate
            ))
            .map_err(Error::store("Failed to prepare query"))?;

        let tasks = stmt
            .query_map([], row_to_task)
            .map_err(Error::store("Failed to query tasks"))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(Error::store("Failed to read tasks"))?;

        let count = tasks.len();
        Ok((tasks, count))
    }

    #[cfg(test)]
    fn backdate(&self, id: i64, added_at: DateTime<Utc>) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE tasks SET added_at = ?2 WHERE id = ?1",
            params![id, added_at.timestamp()],
        )?;
        Ok(())
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn validate_command(command: &str) -> Result<()> {
    if command.trim().is_empty() {
        return Err(Error::InvalidCommand("command must not be empty".to_string()));
    }
    Ok(())
}

fn begin(conn: &mut Connection) -> Result<Transaction<'_>> {
    conn.transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(Error::store("Failed to begin transaction"))
}

fn insert_pending(tx: &Transaction<'_>, command: &str) -> Result<i64> {
    tx.execute(
        "INSERT INTO tasks (added_at, command, status) VALUES (?1, ?2, ?3)",
        params![now(), command, TaskStatus::Pending],
    )
    .map_err(Error::store("Failed to insert task"))?;

    Ok(tx.last_insert_rowid())
}

fn now() -> i64 {
    Utc::now().timestamp()
}

fn timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let secs: Option<i64> = row.get(idx)?;
    secs.map(|s| {
        DateTime::from_timestamp(s, 0).ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, s))
    })
    .transpose()
}

fn row_to_task(row: &Row<'_>) -> rusqlite::Result<TaskRecord> {
    let added_at = timestamp(row, 1)?.ok_or(rusqlite::Error::InvalidColumnType(
        1,
        "added_at".to_string(),
        rusqlite::types::Type::Null,
    ))?;

    let time_real: Option<f64> = row.get(9)?;
    let time_user: Option<f64> = row.get(10)?;
    let time_sys: Option<f64> = row.get(11)?;
    let timing = match (time_real, time_user, time_sys) {
        (Some(real), Some(user), Some(sys)) => Some(RunTiming { real, user, sys }),
        _ => None,
    };

    Ok(TaskRecord {
        id: row.get(0)?,
        added_at,
        run_at: timestamp(row, 2)?,
        finished_at: timestamp(row, 3)?,
        command: row.get(4)?,
        status: row.get(5)?,
        result: row.get(6)?,
        stdout: row.get(7)?,
        stderr: row.get(8)?,
        timing,
    })
}

impl ToSql for TaskStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TaskStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        TaskStatus::parse(s)
            .ok_or_else(|| FromSqlError::Other(format!("unknown task status: {}", s).into()))
    }
}
