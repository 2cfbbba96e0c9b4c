//! The event log engine.
//!
//! Each raw notification goes through classify, snapshot, dedup and persist,
//! in that order, one event at a time. The engine exclusively owns its store
//! and dedup table; running two engines against one log loses updates.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use super::classify::classify;
use super::dedup::DedupTable;
use super::records::{Details, EventRecord, EventType};
use super::snapshot;
use super::store::LogStore;
use crate::watcher::RawEvent;
use crate::Result;

/// Counters for one engine run.
#[derive(Debug, Default)]
pub struct EngineStats {
    pub received: AtomicU64,
    pub ignored: AtomicU64,
    pub suppressed: AtomicU64,
    pub recorded: AtomicU64,
    pub degraded: AtomicU64,
    pub persist_failures: AtomicU64,
}

impl EngineStats {
    /// Create new stats tracker.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Get snapshot of current stats.
    #[must_use]
    pub fn snapshot(&self) -> EngineStatsSnapshot {
        EngineStatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
            suppressed: self.suppressed.load(Ordering::Relaxed),
            recorded: self.recorded.load(Ordering::Relaxed),
            degraded: self.degraded.load(Ordering::Relaxed),
            persist_failures: self.persist_failures.load(Ordering::Relaxed),
        }
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Snapshot of engine stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineStatsSnapshot {
    pub received: u64,
    pub ignored: u64,
    pub suppressed: u64,
    pub recorded: u64,
    pub degraded: u64,
    pub persist_failures: u64,
}

/// What happened to one raw notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The notification kind is never logged.
    Ignored,
    /// Dropped as noise following an earlier record.
    Suppressed(EventType),
    /// Appended to the log.
    Recorded(EventRecord),
}

/// Classifies, deduplicates and persists raw notifications.
#[derive(Debug)]
pub struct EventLog<S> {
    store: S,
    dedup: DedupTable,
    stats: Arc<EngineStats>,
}

impl<S: LogStore> EventLog<S> {
    /// Create an engine writing to `store`, with an empty dedup table.
    pub fn new(store: S) -> Self {
        Self::with_stats(store, EngineStats::new())
    }

    /// Create an engine reporting into shared `stats`.
    pub fn with_stats(store: S, stats: Arc<EngineStats>) -> Self {
        Self {
            store,
            dedup: DedupTable::new(),
            stats,
        }
    }

    /// Process one raw notification.
    ///
    /// Snapshot failures are recorded in the event's details. A failed
    /// append is retried once.
    ///
    /// # Errors
    ///
    /// Returns an error if the record could not be persisted after the retry.
    /// The dedup table has already been updated at that point.
    pub fn handle(&mut self, event: &RawEvent) -> Result<Outcome> {
        EngineStats::bump(&self.stats.received);

        let Some(event_type) = classify(event) else {
            EngineStats::bump(&self.stats.ignored);
            tracing::trace!(path = %event.path.display(), "Ignoring directory modification");
            return Ok(Outcome::Ignored);
        };

        let subject = event.subject();
        let details = if event_type.captures_snapshot() {
            self.capture(subject)
        } else {
            None
        };

        if !self.dedup.should_record(subject, event_type) {
            EngineStats::bump(&self.stats.suppressed);
            tracing::debug!(path = %subject.display(), %event_type, "Suppressed modification following creation");
            return Ok(Outcome::Suppressed(event_type));
        }

        let mut record = EventRecord::new(event_type, subject, details);
        if let Some((source, destination)) = event.move_paths() {
            record = record.with_move(source, destination);
        }

        self.dedup.remember(subject, record.clone());
        self.persist(&record)?;

        EngineStats::bump(&self.stats.recorded);
        tracing::info!(path = %record.path, event_type = %record.event_type, "Recorded event");
        Ok(Outcome::Recorded(record))
    }

    fn capture(&self, path: &Path) -> Option<Details> {
        let details = snapshot::capture(path);
        if let Some(Details::Error { error }) = &details {
            EngineStats::bump(&self.stats.degraded);
            tracing::warn!(path = %path.display(), %error, "Metadata capture failed");
        }
        details
    }

    fn persist(&mut self, record: &EventRecord) -> Result<()> {
        if let Err(first) = self.store.append(record) {
            tracing::warn!(path = %record.path, error = %first, "Append failed, retrying once");
            if let Err(e) = self.store.append(record) {
                EngineStats::bump(&self.stats.persist_failures);
                tracing::error!(
                    path = %record.path,
                    event_type = %record.event_type,
                    error = %e,
                    "Event could not be persisted"
                );
                return Err(e);
            }
        }
        Ok(())
    }

    /// Process notifications from `rx` until every sender is gone.
    ///
    /// Blocks the calling thread; run it on a dedicated thread. Persistence
    /// failures are logged and processing continues with the next event.
    pub fn run_blocking(&mut self, rx: &mut mpsc::Receiver<RawEvent>) {
        while let Some(event) = rx.blocking_recv() {
            // Already logged by `persist`.
            let _ = self.handle(&event);

            let stats = self.stats.snapshot();
            tracing::debug!(
                received = stats.received,
                recorded = stats.recorded,
                suppressed = stats.suppressed,
                ignored = stats.ignored,
                "Processed event"
            );
        }
    }

    /// Shared handle to the engine's counters.
    #[must_use]
    pub fn stats(&self) -> Arc<EngineStats> {
        Arc::clone(&self.stats)
    }

    /// The underlying store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// The dedup table.
    #[must_use]
    pub const fn dedup(&self) -> &DedupTable {
        &self.dedup
    }

    /// Consume the engine, returning its store.
    pub fn into_store(self) -> S {
        self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::store::MemoryStore;
    use std::fs;
    use tempfile::TempDir;

    fn engine() -> EventLog<MemoryStore> {
        EventLog::new(MemoryStore::new())
    }

    #[test]
    fn test_create_then_modify_yields_one_record() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("f.txt");
        fs::write(&path, "hello").unwrap();

        let mut log = engine();
        assert!(matches!(
            log.handle(&RawEvent::created(&path, false)).unwrap(),
            Outcome::Recorded(_)
        ));
        assert_eq!(
            log.handle(&RawEvent::modified(&path, false)).unwrap(),
            Outcome::Suppressed(EventType::FileModified)
        );

        let records = log.store().records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].event_type, EventType::FileCreated);
        assert_eq!(
            records[0].md5(),
            Some("5d41402abc4b2a76b9719d911017c592")
        );
    }

    #[test]
    fn test_second_modify_is_recorded() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("f.txt");
        fs::write(&path, "hello").unwrap();

        let mut log = engine();
        log.handle(&RawEvent::created(&path, false)).unwrap();
        log.handle(&RawEvent::modified(&path, false)).unwrap();
        log.handle(&RawEvent::modified(&path, false)).unwrap();

        let types: Vec<_> = log.store().records().iter().map(|r| r.event_type).collect();
        assert_eq!(types, vec![EventType::FileCreated, EventType::FileModified]);

        let stats = log.stats().snapshot();
        assert_eq!(stats.received, 3);
        assert_eq!(stats.recorded, 2);
        assert_eq!(stats.suppressed, 1);
    }

    #[test]
    fn test_directory_modification_ignored() {
        let tmp = TempDir::new().unwrap();
        let mut log = engine();

        assert_eq!(
            log.handle(&RawEvent::modified(tmp.path(), true)).unwrap(),
            Outcome::Ignored
        );
        assert!(log.store().records().is_empty());
        assert!(log.dedup().is_empty());
        assert_eq!(log.stats().snapshot().ignored, 1);
    }

    #[test]
    fn test_delete_has_no_details() {
        let mut log = engine();
        log.handle(&RawEvent::deleted("/a/gone.txt", false)).unwrap();

        let record = &log.store().records()[0];
        assert_eq!(record.event_type, EventType::FileDeleted);
        assert_eq!(record.path, "/a/gone.txt");
        assert!(record.details.is_none());
    }

    #[test]
    fn test_move_is_keyed_by_destination() {
        let tmp = TempDir::new().unwrap();
        let old = tmp.path().join("old.txt");
        let new = tmp.path().join("new.txt");
        fs::write(&new, "moved").unwrap();

        let mut log = engine();
        log.handle(&RawEvent::created(&old, false)).unwrap();
        log.handle(&RawEvent::moved(&old, &new, false)).unwrap();
        // Keyed by the new path, whose last record is a move.
        log.handle(&RawEvent::modified(&new, false)).unwrap();

        let records = log.store().records();
        assert_eq!(records.len(), 3);

        let moved = &records[1];
        assert_eq!(moved.event_type, EventType::FileMoved);
        assert_eq!(moved.path, new.to_string_lossy());
        assert_eq!(moved.source_path.as_deref(), Some(&*old.to_string_lossy()));
        assert_eq!(
            moved.destination_path.as_deref(),
            Some(&*new.to_string_lossy())
        );
        assert!(moved.md5().is_some());
    }

    #[test]
    fn test_create_of_vanished_file_has_no_details() {
        let tmp = TempDir::new().unwrap();
        let mut log = engine();
        log.handle(&RawEvent::created(tmp.path().join("raced.txt"), false))
            .unwrap();

        let record = &log.store().records()[0];
        assert_eq!(record.event_type, EventType::FileCreated);
        assert!(record.details.is_none());
    }

    #[test]
    fn test_snapshot_failure_is_recorded() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("plain.txt");
        fs::write(&file, "x").unwrap();

        let mut log = engine();
        log.handle(&RawEvent::created(file.join("child"), false))
            .unwrap();

        let record = &log.store().records()[0];
        assert!(record.details.as_ref().is_some_and(Details::is_error));
        assert_eq!(log.stats().snapshot().degraded, 1);
    }

    #[test]
    fn test_append_retried_once() {
        let mut store = MemoryStore::new();
        store.fail_next(1);
        let mut log = EventLog::new(store);

        log.handle(&RawEvent::deleted("/a", false)).unwrap();
        assert_eq!(log.store().records().len(), 1);
        assert_eq!(log.stats().snapshot().persist_failures, 0);
    }

    #[test]
    fn test_persistent_append_failure_surfaces() {
        let mut store = MemoryStore::new();
        store.fail_next(2);
        let mut log = EventLog::new(store);

        let err = log.handle(&RawEvent::deleted("/a", false)).unwrap_err();
        assert!(matches!(err, crate::Error::Store(_)));
        assert!(log.store().records().is_empty());
        assert_eq!(log.stats().snapshot().persist_failures, 1);

        // The next event goes through normally.
        log.handle(&RawEvent::deleted("/b", false)).unwrap();
        assert_eq!(log.store().records().len(), 1);
    }

    #[test]
    fn test_run_blocking_drains_channel() {
        let (tx, mut rx) = mpsc::channel(8);
        tx.blocking_send(RawEvent::deleted("/a", false)).unwrap();
        tx.blocking_send(RawEvent::modified("/dir", true)).unwrap();
        tx.blocking_send(RawEvent::deleted("/b", true)).unwrap();
        drop(tx);

        let mut log = engine();
        log.run_blocking(&mut rx);

        let types: Vec<_> = log
            .into_store()
            .records()
            .iter()
            .map(|r| r.event_type)
            .collect();
        assert_eq!(types, vec![EventType::FileDeleted, EventType::FolderDeleted]);
    }
}
