//! Persisted event records.
//!
//! This module defines:
//! - The seven semantic event type tags
//! - The metadata snapshot attached to non-deletion events
//! - The event record appended to the log

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Semantic type of a recorded event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    FileCreated,
    FileModified,
    FileDeleted,
    FolderCreated,
    FolderDeleted,
    FileMoved,
    FolderMoved,
}

impl EventType {
    /// Tag as written to the log.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FileCreated => "file_created",
            Self::FileModified => "file_modified",
            Self::FileDeleted => "file_deleted",
            Self::FolderCreated => "folder_created",
            Self::FolderDeleted => "folder_deleted",
            Self::FileMoved => "file_moved",
            Self::FolderMoved => "folder_moved",
        }
    }

    /// Whether this is a deletion.
    #[must_use]
    pub const fn is_deletion(self) -> bool {
        matches!(self, Self::FileDeleted | Self::FolderDeleted)
    }

    /// Whether a metadata snapshot is taken for this event.
    #[must_use]
    pub const fn captures_snapshot(self) -> bool {
        !self.is_deletion()
    }

    /// Whether this is a move.
    #[must_use]
    pub const fn is_move(self) -> bool {
        matches!(self, Self::FileMoved | Self::FolderMoved)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time file system attributes of a path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Size in bytes.
    pub size: u64,

    /// Creation time.
    pub created: DateTime<Local>,

    /// Last modification time.
    pub modified: DateTime<Local>,

    /// Low-order permission bits in octal, e.g. "644".
    pub permissions: String,

    /// MD5 of the full content; regular files only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md5: Option<String>,
}

/// The `details` payload of a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Details {
    /// A complete snapshot.
    Snapshot(Metadata),
    /// Capturing the snapshot failed.
    Error { error: String },
}

impl Details {
    /// The snapshot, if capture succeeded.
    #[must_use]
    pub const fn metadata(&self) -> Option<&Metadata> {
        match self {
            Self::Snapshot(m) => Some(m),
            Self::Error { .. } => None,
        }
    }

    /// Whether capture failed.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

/// One accepted, classified event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// When the record was created.
    pub timestamp: DateTime<Local>,

    /// Semantic event type.
    pub event_type: EventType,

    /// Subject path; the destination for moves.
    pub path: String,

    /// Metadata snapshot, absent for deletions and vanished paths.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Details>,

    /// Path before a move.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_path: Option<String>,

    /// Path after a move.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_path: Option<String>,
}

impl EventRecord {
    /// Create a record stamped with the current local time.
    #[must_use]
    pub fn new(event_type: EventType, path: &Path, details: Option<Details>) -> Self {
        Self {
            timestamp: Local::now(),
            event_type,
            path: path.to_string_lossy().into_owned(),
            details,
            source_path: None,
            destination_path: None,
        }
    }

    /// Attach the source and destination of a move.
    #[must_use]
    pub fn with_move(mut self, source: &Path, destination: &Path) -> Self {
        self.source_path = Some(source.to_string_lossy().into_owned());
        self.destination_path = Some(destination.to_string_lossy().into_owned());
        self
    }

    /// MD5 from the snapshot, if any.
    #[must_use]
    pub fn md5(&self) -> Option<&str> {
        self.details
            .as_ref()
            .and_then(Details::metadata)
            .and_then(|m| m.md5.as_deref())
    }
}
