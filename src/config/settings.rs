//! Configuration settings and validation.

use crate::{Error, Result};
use std::path::PathBuf;

/// Valid log levels, in increasing severity.
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Main configuration for the change logger.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root of the directory tree to watch.
    pub watch_dir: PathBuf,

    /// Path of the JSON event log.
    pub log_file: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit diagnostics as JSON.
    pub log_json: bool,

    /// Gitignore-style patterns for paths that should not be recorded.
    pub ignore_patterns: Vec<String>,

    /// Create the watch root if it does not exist.
    pub create_watch_dir: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            watch_dir: PathBuf::from("./watched"),
            log_file: PathBuf::from("./logs/changes.json"),
            log_level: "info".to_string(),
            log_json: false,
            ignore_patterns: Vec::new(),
            create_watch_dir: true,
        }
    }
}

impl Config {
    /// Create a new configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<()> {
        if !LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(Error::config(format!(
                "invalid log level '{}', must be one of: {}",
                self.log_level,
                LOG_LEVELS.join(", ")
            )));
        }

        if self.watch_dir.as_os_str().is_empty() {
            return Err(Error::config("watch_dir cannot be empty"));
        }

        if self.log_file.as_os_str().is_empty() {
            return Err(Error::config("log_file cannot be empty"));
        }

        if self.log_file.is_dir() {
            return Err(Error::config(format!(
                "log_file '{}' is a directory",
                self.log_file.display()
            )));
        }

        if self.log_file == self.watch_dir {
            return Err(Error::config("log_file cannot be the watch_dir itself"));
        }

        Ok(())
    }

    /// Make sure the watch root exists.
    ///
    /// Creates it when missing and `create_watch_dir` is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the root is missing and may not be created, is not
    /// a directory, or cannot be created.
    pub fn prepare_watch_dir(&self) -> Result<()> {
        if self.watch_dir.is_dir() {
            return Ok(());
        }

        if self.watch_dir.exists() {
            return Err(Error::config(format!(
                "watch_dir '{}' is not a directory",
                self.watch_dir.display()
            )));
        }

        if !self.create_watch_dir {
            return Err(Error::config(format!(
                "watch_dir '{}' does not exist",
                self.watch_dir.display()
            )));
        }

        std::fs::create_dir_all(&self.watch_dir)?;
        tracing::info!(path = %self.watch_dir.display(), "Created watch directory");
        Ok(())
    }
}
