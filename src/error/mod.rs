//! Error types and Result aliases for dirlog.
//!
//! This module defines the error hierarchy used throughout the crate.
//! Metadata snapshot failures are deliberately absent: they are folded into
//! the recorded event instead of being raised.

use thiserror::Error;

/// Result type alias using dirlog's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for dirlog operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Log store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// File watching error.
    #[error("watcher error: {0}")]
    Watcher(#[from] WatcherError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Log store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to prepare the log file or its directory.
    #[error("failed to initialize log '{path}': {reason}")]
    Init { path: String, reason: String },

    /// Failed to encode the event history.
    #[error("failed to serialize event log: {0}")]
    Serialize(String),

    /// Failed to persist the event history.
    #[error("failed to write log '{path}': {reason}")]
    Write { path: String, reason: String },
}

/// File watcher errors.
#[derive(Error, Debug)]
pub enum WatcherError {
    /// Failed to watch path.
    #[error("failed to watch path '{path}': {reason}")]
    WatchFailed { path: String, reason: String },

    /// The receiving side of the event channel is gone.
    #[error("event channel closed")]
    ChannelClosed,
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl StoreError {
    /// Create a write error for the given log path.
    pub fn write(path: impl AsRef<std::path::Path>, reason: impl ToString) -> Self {
        Self::Write {
            path: path.as_ref().display().to_string(),
            reason: reason.to_string(),
        }
    }
}
