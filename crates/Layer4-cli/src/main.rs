//! tsp CLI - Main entry point

mod report;

use anyhow::Context;
use clap::Parser;
use report::ListKind;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tsp_foundation::{Error, TspConfig};
use tsp_task::{run_daemon, DaemonExit, TaskClient};

/// tsp - personal task spooler
///
/// Queue commands for a single background worker and inspect their results.
#[derive(Parser, Debug)]
#[command(name = "tsp")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Command to queue (all words are joined with single spaces)
    #[arg(trailing_var_arg = true)]
    command: Vec<String>,

    /// Replace queued tasks with the same command
    #[arg(long)]
    replace: bool,

    /// Show one task in full
    #[arg(short, long, value_name = "ID")]
    show: Option<i64>,

    /// List pending tasks
    #[arg(short, long)]
    pending: bool,

    /// List finished tasks
    #[arg(short = 'e', long)]
    finished: bool,

    /// List failed tasks
    #[arg(short, long)]
    failed: bool,

    /// Delete pending tasks
    #[arg(short = 'd', long)]
    purge: bool,

    /// Run the daemon
    #[arg(long)]
    run: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Only print warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Task database path (overrides config and TSP_DB)
    #[arg(long, value_name = "PATH")]
    db: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    match run(args).await {
        Ok(()) => Ok(()),
        Err(e) => match user_error(&e) {
            // 사용자 실수는 한 줄 메시지로만 보고
            Some(message) => {
                eprintln!("tsp: {}", message);
                std::process::exit(1);
            }
            None => Err(e),
        },
    }
}

/// Message for errors caused by the user's input or a running daemon
fn user_error(e: &anyhow::Error) -> Option<String> {
    e.downcast_ref::<Error>()
        .filter(|e| e.is_user_facing())
        .map(ToString::to_string)
}

async fn run(args: Args) -> anyhow::Result<()> {
    // Initialize logging
    let log_level = if args.verbose {
        "debug"
    } else if args.quiet {
        "warn"
    } else {
        "info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let mut config = TspConfig::load().context("Failed to load configuration")?;
    if let Some(db) = &args.db {
        config.db_path = db.clone();
    }
    debug!("Options: {:?}, Config: {:?}", args, config);

    if args.run {
        // LockHeld 는 그대로 전파되어 non-zero 로 종료
        let DaemonExit::Reload = run_daemon(&config).await?;
        return Ok(());
    }

    let client = TaskClient::open(&config)?;

    if args.pending {
        let (tasks, count) = client.list_pending()?;
        print!("{}", report::task_list(ListKind::Pending, &tasks, count));
    } else if args.finished {
        let (tasks, count) = client.list_finished()?;
        print!("{}", report::task_list(ListKind::Finished, &tasks, count));
    } else if args.failed {
        let (tasks, count) = client.list_failed()?;
        print!("{}", report::task_list(ListKind::Failed, &tasks, count));
    } else if args.purge {
        let count = client.purge_pending()?;
        if !args.quiet {
            println!("Deleted {} pending tasks.", count);
        }
    } else if let Some(id) = args.show {
        let task = client.get(id)?;
        print!("{}", report::task_detail(&task));
    } else if !args.command.is_empty() {
        let id = client.submit(&args.command, args.replace)?;
        if !args.quiet {
            println!("Task {} added.", id);
        }
    } else {
        let (tasks, count) = client.list_recent(None)?;
        print!("{}", report::task_list(ListKind::Recent, &tasks, count));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_command_words() {
        let args = Args::parse_from(["tsp", "--replace", "rsync", "-a", "src/", "dst/"]);
        assert!(args.replace);
        assert_eq!(args.command, vec!["rsync", "-a", "src/", "dst/"]);
    }

    #[test]
    fn test_list_flags() {
        let args = Args::parse_from(["tsp", "-e"]);
        assert!(args.finished);
        assert!(args.command.is_empty());

        let args = Args::parse_from(["tsp", "-s", "12"]);
        assert_eq!(args.show, Some(12));
    }

    #[test]
    fn test_user_errors_are_short() {
        let not_found = anyhow::Error::from(Error::NotFound(9));
        assert_eq!(user_error(&not_found).as_deref(), Some("Task not found: 9"));

        let store = anyhow::Error::from(Error::StoreUnavailable("disk gone".into()));
        assert!(user_error(&store).is_none());

        let other = anyhow::anyhow!("boom");
        assert!(user_error(&other).is_none());
    }

    #[test]
    fn test_verbose_and_quiet_conflict() {
        assert!(Args::try_parse_from(["tsp", "-v", "-q"]).is_err());
    }
}
