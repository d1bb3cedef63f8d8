//! Notification sink
//!
//! 상태 전이 후 (subject, body) 를 외부로 내보낸다.
//! 전송 실패는 호출자가 로그만 남기고 무시한다 - 태스크 상태 전이를 막지 않음.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};
use tsp_foundation::{CommandOutput, Error, NotifyConfig, Result, TaskRecord};

/// Outbound message sink
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, subject: &str, body: &str) -> Result<()>;

    fn name(&self) -> &'static str;
}

// ============================================================================
// Messages
// ============================================================================

/// A notification ready to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub subject: String,
    pub body: String,
}

impl Notification {
    pub fn reset(count: usize) -> Self {
        Self {
            subject: "Running tasks reset".to_string(),
            body: format!(
                "{} running task(s) were reset to pending after a daemon restart, \
                 please check them and re-run as necessary",
                count
            ),
        }
    }

    pub fn finished(task: &TaskRecord, output: &CommandOutput) -> Self {
        Self {
            subject: "Task finished".to_string(),
            body: format!(
                "Task id: {}\nTask: {}\nResult: {}\nOutput: {}\nError: {}",
                task.id, task.command, output.exit_code, output.stdout, output.stderr
            ),
        }
    }

    pub fn failed(task: &TaskRecord, error: &str) -> Self {
        Self {
            subject: "Task failed".to_string(),
            body: format!(
                "Task id: {}\nTask: {}\nOutput: {}",
                task.id, task.command, error
            ),
        }
    }
}

// ============================================================================
// Sinks
// ============================================================================

/// Disabled notifications
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn notify(&self, _subject: &str, _body: &str) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "null"
    }
}

/// Writes notifications to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, subject: &str, body: &str) -> Result<()> {
        info!(subject, "{}", body);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Upper bound for one sendmail run
pub const MAIL_TIMEOUT: Duration = Duration::from_secs(30);

/// Sends mail through a sendmail-compatible program (`<sendmail> -t`)
#[derive(Debug, Clone)]
pub struct MailNotifier {
    to: String,
    from: String,
    sendmail: PathBuf,
    timeout: Duration,
}

impl MailNotifier {
    pub fn new(to: impl Into<String>, from: impl Into<String>, sendmail: impl Into<PathBuf>) -> Self {
        Self {
            to: to.into(),
            from: from.into(),
            sendmail: sendmail.into(),
            timeout: MAIL_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// RFC 5322 message; header values are flattened to a single line
    pub fn render(&self, subject: &str, body: &str) -> String {
        format!(
            "From: {}\nTo: {}\nSubject: {}\nContent-Type: text/plain; charset=utf-8\n\n{}\n",
            single_line(&self.from),
            single_line(&self.to),
            single_line(subject),
            body
        )
    }

    async fn send(&self, message: String) -> Result<()> {
        let mut child = Command::new(&self.sendmail)
            .arg("-t")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::Notify(format!("Failed to start {}: {}", self.sendmail.display(), e))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(message.as_bytes()).await?;
            // stdin dropped here -> EOF
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(Error::Notify(format!(
                "{} exited with {}: {}",
                self.sendmail.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for MailNotifier {
    async fn notify(&self, subject: &str, body: &str) -> Result<()> {
        let message = self.render(subject, body);

        // 시간 초과 시 future 가 drop 되며 kill_on_drop 으로 자식도 종료됨
        match tokio::time::timeout(self.timeout, self.send(message)).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(sendmail = %self.sendmail.display(), "sendmail timed out, killed");
                return Err(Error::Notify(format!(
                    "{} did not finish within {:.1}s",
                    self.sendmail.display(),
                    self.timeout.as_secs_f64()
                )));
            }
        }

        debug!(to = %self.to, subject, "Notification mailed");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "mail"
    }
}

/// Pick a sink: disabled → null, no recipient → log, otherwise mail
pub fn notifier_from_config(config: &NotifyConfig) -> Box<dyn Notifier> {
    if !config.enabled {
        return Box::new(NullNotifier);
    }

    match config.mail_to.as_deref().map(str::trim) {
        Some(to) if !to.is_empty() => Box::new(MailNotifier::new(
            to,
            config.mail_from.clone(),
            config.sendmail.clone(),
        )),
        _ => Box::new(LogNotifier),
    }
}

fn single_line(value: &str) -> String {
    value.replace(['\r', '\n'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tsp_foundation::TaskStatus;

    fn task(id: i64, command: &str) -> TaskRecord {
        TaskRecord {
            id,
            added_at: Utc::now(),
            run_at: None,
            finished_at: None,
            command: command.to_string(),
            status: TaskStatus::Running,
            result: None,
            stdout: None,
            stderr: None,
            timing: None,
        }
    }

    #[test]
    fn test_notification_bodies() {
        let t = task(5, "make test");

        let done = Notification::finished(&t, &CommandOutput::new(0, "ok\n", ""));
        assert_eq!(done.subject, "Task finished");
        assert!(done.body.contains("Task id: 5"));
        assert!(done.body.contains("Task: make test"));
        assert!(done.body.contains("Output: ok"));

        let failed = Notification::failed(&t, "Executable not found: make");
        assert_eq!(failed.subject, "Task failed");
        assert!(failed.body.contains("Executable not found: make"));

        assert!(Notification::reset(2).body.starts_with("2 running task(s)"));
    }

    #[test]
    fn test_render_mail_headers() {
        let mailer = MailNotifier::new("me@example.com", "tsp@localhost", "/usr/sbin/sendmail");
        let message = mailer.render("Task\nfinished", "line1\nline2");

        assert!(message.starts_with("From: tsp@localhost\nTo: me@example.com\n"));
        assert!(message.contains("Subject: Task finished\n"));
        assert!(message.ends_with("\n\nline1\nline2\n"));
    }

    #[test]
    fn test_notifier_selection() {
        let mut config = NotifyConfig::default();
        assert_eq!(notifier_from_config(&config).name(), "log");

        config.mail_to = Some("me@example.com".to_string());
        assert_eq!(notifier_from_config(&config).name(), "mail");

        config.mail_to = Some("  ".to_string());
        assert_eq!(notifier_from_config(&config).name(), "log");

        config.enabled = false;
        assert_eq!(notifier_from_config(&config).name(), "null");
    }

    #[tokio::test]
    async fn test_missing_sendmail_is_notify_error() {
        let mailer = MailNotifier::new("me@example.com", "tsp@localhost", "/no/such/sendmail");
        let err = mailer.notify("subject", "body").await.unwrap_err();
        assert!(matches!(err, Error::Notify(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_mail_piped_to_program() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("mail.txt");
        let fake = dir.path().join("fake-sendmail");
        std::fs::write(&fake, format!("#!/bin/sh\ncat > '{}'\n", out.display())).unwrap();
        std::fs::set_permissions(&fake, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mailer = MailNotifier::new("me@example.com", "tsp@localhost", &fake);
        mailer.notify("Task finished", "Task id: 1").await.unwrap();

        let sent = std::fs::read_to_string(&out).unwrap();
        assert!(sent.contains("To: me@example.com"));
        assert!(sent.contains("Subject: Task finished"));
        assert!(sent.contains("Task id: 1"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_hung_sendmail_times_out() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("stuck-sendmail");
        std::fs::write(&fake, "#!/bin/sh\nexec sleep 30\n").unwrap();
        std::fs::set_permissions(&fake, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mailer = MailNotifier::new("me@example.com", "tsp@localhost", &fake)
            .with_timeout(Duration::from_millis(200));

        let started = std::time::Instant::now();
        let err = mailer.notify("Task finished", "Task id: 1").await.unwrap_err();
        assert!(matches!(err, Error::Notify(_)));
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
