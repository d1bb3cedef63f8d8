//! Terminal reports for task lists and single tasks

use chrono::{DateTime, Local, Utc};
use std::fmt::Write;
use tsp_foundation::{TaskRecord, TaskStatus};

const DATE_FMT: &str = "%Y-%m-%d %H:%M:%S";

/// Which list is being printed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Recent,
    Pending,
    Finished,
    Failed,
}

impl ListKind {
    fn header(self) -> &'static str {
        match self {
            ListKind::Recent => "Recent tasks:",
            ListKind::Pending => "Pending tasks:",
            ListKind::Finished => "Finished tasks:",
            ListKind::Failed => "Failed tasks:",
        }
    }

    fn empty(self) -> &'static str {
        match self {
            ListKind::Recent => "No recent tasks.",
            ListKind::Pending => "No pending tasks.",
            ListKind::Finished => "No finished tasks.",
            ListKind::Failed => "No failed tasks.",
        }
    }
}

/// Status mark shown in the `res` column
pub fn status_mark(task: &TaskRecord) -> char {
    match task.status {
        TaskStatus::Pending => '-',
        TaskStatus::Running => '*',
        _ if task.succeeded() => '✓',
        _ => 'x',
    }
}

pub fn task_list(kind: ListKind, tasks: &[TaskRecord], count: usize) -> String {
    if count == 0 {
        return format!("{}\n", kind.empty());
    }

    let mut out = String::new();
    let _ = writeln!(out, "--- {} ---", kind.header());
    let _ = writeln!(out, "   id  date   time     dur res command");
    let _ = writeln!(out, "----- ------ ------ ------- --- -----------------");

    for task in tasks {
        let when = task
            .finished_at
            .map(|t| local(t).format("%d.%m  %H:%M").to_string())
            .unwrap_or_else(|| "--.--  --:--".to_string());
        let dur = task
            .duration()
            .map(|d| d.num_seconds().to_string())
            .unwrap_or_else(|| "-".to_string());

        let _ = writeln!(
            out,
            "{:>5}  {}  {:>7}  {}  {}",
            task.id,
            when,
            dur,
            status_mark(task),
            task.command
        );
    }

    out
}

pub fn task_detail(task: &TaskRecord) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "task id    : {}", task.id);
    let _ = writeln!(out, "added at   : {}", local(task.added_at).format(DATE_FMT));
    let _ = writeln!(out, "status     : {}", task.status);
    let _ = writeln!(out, "run at     : {}", timestamp(task.run_at));
    let _ = writeln!(out, "finished at: {}", timestamp(task.finished_at));
    let _ = writeln!(out, "command    : {}", task.command);
    match task.result {
        Some(code) => {
            let _ = writeln!(out, "result     : {}", code);
        }
        None => {
            let _ = writeln!(out, "result     : none");
        }
    }

    if let Some(timing) = &task.timing {
        let _ = writeln!(out, "real time  : {:.3}", timing.real);
        let _ = writeln!(out, "user time  : {:.3}", timing.user);
        let _ = writeln!(out, "sys time   : {:.3}", timing.sys);
    }

    let stdout = task.stdout.as_deref().unwrap_or("");
    let stderr = task.stderr.as_deref().unwrap_or("");
    if stdout.is_empty() {
        let _ = writeln!(out, "stdout     : empty");
    }
    if stderr.is_empty() {
        let _ = writeln!(out, "stderr     : empty");
    }
    if !stdout.is_empty() {
        let _ = write!(out, "\n--- stdout ---\n\n{}\n", stdout.trim_end());
    }
    if !stderr.is_empty() {
        let _ = write!(out, "\n--- stderr ---\n\n{}\n", stderr.trim_end());
    }

    out
}

fn local(t: DateTime<Utc>) -> DateTime<Local> {
    t.with_timezone(&Local)
}

fn timestamp(t: Option<DateTime<Utc>>) -> String {
    t.map(|t| local(t).format(DATE_FMT).to_string())
        .unwrap_or_else(|| "never".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tsp_foundation::RunTiming;

    fn task(id: i64, status: TaskStatus, result: Option<i32>) -> TaskRecord {
        let added_at = Utc::now();
        let terminal = status.is_terminal();
        TaskRecord {
            id,
            added_at,
            run_at: (status != TaskStatus::Pending).then_some(added_at),
            finished_at: terminal.then(|| added_at + chrono::Duration::seconds(3)),
            command: "make test".to_string(),
            status,
            result,
            stdout: terminal.then(|| "built\n".to_string()),
            stderr: terminal.then(String::new),
            timing: terminal.then(RunTiming::zero),
        }
    }

    #[test]
    fn test_status_marks() {
        assert_eq!(status_mark(&task(1, TaskStatus::Pending, None)), '-');
        assert_eq!(status_mark(&task(1, TaskStatus::Running, None)), '*');
        assert_eq!(status_mark(&task(1, TaskStatus::Finished, Some(0))), '✓');
        assert_eq!(status_mark(&task(1, TaskStatus::Finished, Some(2))), 'x');
        assert_eq!(status_mark(&task(1, TaskStatus::Failed, Some(-1))), 'x');
    }

    #[test]
    fn test_empty_list() {
        assert_eq!(task_list(ListKind::Failed, &[], 0), "No failed tasks.\n");
    }

    #[test]
    fn test_list_rows() {
        let tasks = vec![
            task(7, TaskStatus::Finished, Some(0)),
            task(8, TaskStatus::Pending, None),
        ];
        let out = task_list(ListKind::Recent, &tasks, 2);

        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "--- Recent tasks: ---");
        assert_eq!(lines.len(), 5);
        assert!(lines[3].starts_with("    7"));
        assert!(lines[3].ends_with("✓  make test"));
        assert!(lines[4].contains("--.--  --:--"));
        assert!(lines[4].ends_with("-  make test"));
    }

    #[test]
    fn test_detail() {
        let out = task_detail(&task(3, TaskStatus::Finished, Some(0)));
        assert!(out.contains("task id    : 3"));
        assert!(out.contains("result     : 0"));
        assert!(out.contains("real time  : 0.000"));
        assert!(out.contains("stderr     : empty"));
        assert!(out.contains("--- stdout ---\n\nbuilt\n"));

        let pending = task_detail(&task(4, TaskStatus::Pending, None));
        assert!(pending.contains("run at     : never"));
        assert!(pending.contains("result     : none"));
        assert!(!pending.contains("real time"));
    }
}
