//! Raw file system notifications, before classification.

#![allow(clippy::missing_const_for_fn)]

use std::path::{Path, PathBuf};

/// Kind of raw notification delivered by the watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawEventKind {
    /// Path was created.
    Created,
    /// Path was deleted.
    Deleted,
    /// Path content or attributes changed.
    Modified,
    /// Path was moved to `dest`.
    Moved { dest: PathBuf },
}

/// A single notification from the watching layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    /// What happened.
    pub kind: RawEventKind,
    /// Whether the subject is a directory.
    pub is_directory: bool,
    /// Primary path; the source path for moves.
    pub path: PathBuf,
}

impl RawEvent {
    /// A created notification.
    #[must_use]
    pub fn created(path: impl Into<PathBuf>, is_directory: bool) -> Self {
        Self {
            kind: RawEventKind::Created,
            is_directory,
            path: path.into(),
        }
    }

    /// A deleted notification.
    #[must_use]
    pub fn deleted(path: impl Into<PathBuf>, is_directory: bool) -> Self {
        Self {
            kind: RawEventKind::Deleted,
            is_directory,
            path: path.into(),
        }
    }

    /// A modified notification.
    #[must_use]
    pub fn modified(path: impl Into<PathBuf>, is_directory: bool) -> Self {
        Self {
            kind: RawEventKind::Modified,
            is_directory,
            path: path.into(),
        }
    }

    /// A moved notification from `from` to `to`.
    #[must_use]
    pub fn moved(from: impl Into<PathBuf>, to: impl Into<PathBuf>, is_directory: bool) -> Self {
        Self {
            kind: RawEventKind::Moved { dest: to.into() },
            is_directory,
            path: from.into(),
        }
    }

    /// The path an event record is about: the destination for moves.
    #[must_use]
    pub fn subject(&self) -> &Path {
        match &self.kind {
            RawEventKind::Moved { dest } => dest,
            _ => &self.path,
        }
    }

    /// Source and destination, for moves only.
    #[must_use]
    pub fn move_paths(&self) -> Option<(&Path, &Path)> {
        match &self.kind {
            RawEventKind::Moved { dest } => Some((&self.path, dest)),
            _ => None,
        }
    }
}
