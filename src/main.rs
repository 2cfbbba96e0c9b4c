//! dirlog - audit log of file system changes
//!
//! Entry point for the dirlog watcher.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use std::path::PathBuf;

use clap::Parser;
use dirlog::journal::{staging_path, EventLog, JsonFileStore};
use dirlog::observability::{init_tracing, TracingConfig};
use dirlog::watcher::{FileWatcher, PathFilter, WatcherConfig};
use dirlog::{Config, Error, Result};

/// dirlog - record changes under a directory to a JSON log
#[derive(Parser, Debug)]
#[command(name = "dirlog")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory tree to watch
    #[arg(short, long, env = "DIRLOG_WATCH_DIR", default_value = "./watched")]
    watch: PathBuf,

    /// Event log file
    #[arg(short, long, env = "DIRLOG_LOG_FILE", default_value = "./logs/changes.json")]
    log_file: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "DIRLOG_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, env = "DIRLOG_LOG_JSON")]
    log_json: bool,

    /// Gitignore-style patterns for paths to leave out of the log
    #[arg(long, env = "DIRLOG_IGNORE", value_delimiter = ',')]
    ignore: Vec<String>,

    /// Fail instead of creating the watch directory when it is missing
    #[arg(long)]
    no_create: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(&TracingConfig {
        level: cli.log_level.clone(),
        json: cli.log_json,
    });

    tracing::info!("dirlog v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config {
        watch_dir: cli.watch,
        log_file: cli.log_file,
        log_level: cli.log_level,
        log_json: cli.log_json,
        ignore_patterns: cli.ignore,
        create_watch_dir: !cli.no_create,
    };

    tracing::debug!(?config, "Configuration loaded");

    config.validate()?;
    config.prepare_watch_dir()?;

    let store = JsonFileStore::open(&config.log_file)?;
    let watch_root = config.watch_dir.canonicalize()?;
    let log_path = store.path().canonicalize()?;

    let patterns: Vec<&str> = config.ignore_patterns.iter().map(String::as_str).collect();
    let filter = PathFilter::with_patterns(&watch_root, &patterns)?
        .exclude(staging_path(&log_path))
        .exclude(log_path.clone());

    let (watcher, mut event_rx) = FileWatcher::new(&WatcherConfig::new(&watch_root), filter)?;

    tracing::info!(
        "Logging changes under {:?} to {:?}",
        watcher.watch_dir(),
        log_path
    );

    let mut engine = EventLog::new(store);
    let stats = engine.stats();
    let engine_task = tokio::task::spawn_blocking(move || engine.run_blocking(&mut event_rx));

    tokio::signal::ctrl_c().await?;
    tracing::info!("Interrupt received, shutting down");

    // Closing the watcher closes the channel; the engine drains what is queued.
    drop(watcher);
    engine_task
        .await
        .map_err(|e| Error::internal(format!("engine thread failed: {e}")))?;

    let summary = stats.snapshot();
    tracing::info!(
        recorded = summary.recorded,
        suppressed = summary.suppressed,
        ignored = summary.ignored,
        degraded = summary.degraded,
        persist_failures = summary.persist_failures,
        "Stopped"
    );

    Ok(())
}
