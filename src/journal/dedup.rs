//! Per-path memory of the last recorded event.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::records::{EventRecord, EventType};

/// Most recent accepted record per path.
///
/// Lives only as long as the process and starts empty; it is not rebuilt
/// from the log. Keys are subject paths, so a move is keyed by its
/// destination.
#[derive(Debug, Default)]
pub struct DedupTable {
    last: HashMap<PathBuf, EventRecord>,
}

impl DedupTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether an event of `event_type` on `path` should be recorded.
    ///
    /// Only a modification directly following a creation of the same path
    /// is suppressed. The lookback is one record deep.
    #[must_use]
    pub fn should_record(&self, path: &Path, event_type: EventType) -> bool {
        !matches!(
            (self.last.get(path).map(|r| r.event_type), event_type),
            (Some(EventType::FileCreated), EventType::FileModified)
        )
    }

    /// Remember `record` as the latest for `path`.
    pub fn remember(&mut self, path: impl Into<PathBuf>, record: EventRecord) {
        self.last.insert(path.into(), record);
    }

    /// The latest record for `path`.
    #[must_use]
    pub fn last(&self, path: &Path) -> Option<&EventRecord> {
        self.last.get(path)
    }

    /// Number of tracked paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.last.len()
    }

    /// Whether no path is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.last.is_empty()
    }
}
