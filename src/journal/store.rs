//! Durable storage for the event log.
//!
//! The default store keeps the whole history as one pretty-printed JSON
//! array and rewrites it on every append:
//!
//! 1. Read and parse the current array (missing or malformed reads as empty)
//! 2. Push the new record
//! 3. Write the array to a staging file and `sync_all` it
//! 4. Rename the staging file over the log
//!
//! Entries this version cannot parse are carried through untouched.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;

use super::records::EventRecord;
use crate::error::StoreError;
use crate::Result;

/// Indentation used when writing the log.
const INDENT: &[u8] = b"    ";

/// An ordered, append-only collection of event records.
pub trait LogStore {
    /// Read back the full history.
    ///
    /// A missing or malformed store reads as empty.
    fn load(&self) -> Vec<EventRecord>;

    /// Append one record after all existing ones.
    ///
    /// # Errors
    ///
    /// Returns an error if the record could not be persisted.
    fn append(&mut self, record: &EventRecord) -> Result<()>;
}

/// Path of the staging file used while replacing `log_file`.
#[must_use]
pub fn staging_path(log_file: &Path) -> PathBuf {
    let mut name = log_file.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Event log kept as a single JSON array on disk.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    staging: PathBuf,
}

impl JsonFileStore {
    /// Open the log at `path`.
    ///
    /// Creates the containing directory if needed, and initializes the log
    /// as an empty array if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or the initial log cannot be created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let init_err = |e: io::Error| StoreError::Init {
            path: path.display().to_string(),
            reason: e.to_string(),
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(init_err)?;
        }

        let store = Self {
            staging: staging_path(&path),
            path,
        };

        if !store.path.exists() {
            store.write_entries(&[]).map_err(|e| StoreError::Init {
                path: store.path.display().to_string(),
                reason: e.to_string(),
            })?;
            tracing::info!(path = %store.path.display(), "Initialized event log");
        }

        Ok(store)
    }

    /// Path of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the staging file.
    #[must_use]
    pub fn staging(&self) -> &Path {
        &self.staging
    }

    /// Raw entries currently on disk.
    fn read_entries(&self) -> Vec<Value> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Unreadable event log, starting from empty history");
                return Vec::new();
            }
        };

        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Array(entries)) => entries,
            Ok(_) => {
                tracing::warn!(path = %self.path.display(), "Event log is not an array, starting from empty history");
                Vec::new()
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Malformed event log, starting from empty history");
                Vec::new()
            }
        }
    }

    fn write_entries(&self, entries: &[Value]) -> Result<()> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(INDENT);
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        entries
            .serialize(&mut ser)
            .map_err(|e| StoreError::Serialize(e.to_string()))?;

        if let Err(e) = self.replace_with(&buf) {
            let _ = fs::remove_file(&self.staging);
            return Err(StoreError::write(&self.path, e).into());
        }
        Ok(())
    }

    fn replace_with(&self, content: &[u8]) -> io::Result<()> {
        let mut file = File::create(&self.staging)?;
        file.write_all(content)?;
        file.sync_all()?;
        drop(file);
        fs::rename(&self.staging, &self.path)
    }
}

impl LogStore for JsonFileStore {
    fn load(&self) -> Vec<EventRecord> {
        self.read_entries()
            .into_iter()
            .filter_map(|entry| match serde_json::from_value(entry) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::debug!(error = %e, "Skipping unrecognized log entry");
                    None
                }
            })
            .collect()
    }

    fn append(&mut self, record: &EventRecord) -> Result<()> {
        let value = serde_json::to_value(record).map_err(|e| StoreError::Serialize(e.to_string()))?;
        let mut entries = self.read_entries();
        entries.push(value);
        self.write_entries(&entries)
    }
}

/// In-memory store, for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Vec<EventRecord>,
    failures: usize,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` appends fail.
    pub fn fail_next(&mut self, count: usize) {
        self.failures = count;
    }

    /// Records appended so far.
    #[must_use]
    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }
}

impl LogStore for MemoryStore {
    fn load(&self) -> Vec<EventRecord> {
        self.records.clone()
    }

    fn append(&mut self, record: &EventRecord) -> Result<()> {
        if self.failures > 0 {
            self.failures -= 1;
            return Err(StoreError::write("<memory>", "injected failure").into());
        }
        self.records.push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::records::EventType;
    use tempfile::TempDir;

    fn record(event_type: EventType, path: &str) -> EventRecord {
        EventRecord::new(event_type, Path::new(path), None)
    }

    #[test]
    fn test_open_initializes_empty_array() {
        let tmp = TempDir::new().unwrap();
        let log = tmp.path().join("logs/nested/changes.json");

        let store = JsonFileStore::open(&log).unwrap();
        assert_eq!(fs::read_to_string(&log).unwrap().trim(), "[]");
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_open_keeps_existing_history() {
        let tmp = TempDir::new().unwrap();
        let log = tmp.path().join("changes.json");

        let mut store = JsonFileStore::open(&log).unwrap();
        store.append(&record(EventType::FileCreated, "/a")).unwrap();

        let reopened = JsonFileStore::open(&log).unwrap();
        assert_eq!(reopened.load().len(), 1);
    }

    #[test]
    fn test_append_preserves_order() {
        let tmp = TempDir::new().unwrap();
        let mut store = JsonFileStore::open(tmp.path().join("changes.json")).unwrap();

        for (i, path) in ["/a", "/b", "/c"].iter().enumerate() {
            store.append(&record(EventType::FileCreated, path)).unwrap();
            assert_eq!(store.load().len(), i + 1);
        }

        let paths: Vec<_> = store.load().into_iter().map(|r| r.path).collect();
        assert_eq!(paths, vec!["/a", "/b", "/c"]);
        assert!(!store.staging().exists());
    }

    #[test]
    fn test_written_log_is_indented() {
        let tmp = TempDir::new().unwrap();
        let mut store = JsonFileStore::open(tmp.path().join("changes.json")).unwrap();
        store.append(&record(EventType::FileDeleted, "/a")).unwrap();

        let content = fs::read_to_string(store.path()).unwrap();
        assert!(content.contains("\n    {\n        \"timestamp\""));
    }

    #[test]
    fn test_malformed_log_is_replaced() {
        let tmp = TempDir::new().unwrap();
        let log = tmp.path().join("changes.json");
        fs::write(&log, "{ not json").unwrap();

        let mut store = JsonFileStore::open(&log).unwrap();
        assert!(store.load().is_empty());

        store.append(&record(EventType::FileCreated, "/a")).unwrap();
        let records = store.load();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].path, "/a");
    }

    #[test]
    fn test_non_array_log_reads_empty() {
        let tmp = TempDir::new().unwrap();
        let log = tmp.path().join("changes.json");
        fs::write(&log, "{\"event_type\": \"file_created\"}").unwrap();

        let store = JsonFileStore::open(&log).unwrap();
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_missing_log_reads_empty() {
        let tmp = TempDir::new().unwrap();
        let log = tmp.path().join("changes.json");
        let mut store = JsonFileStore::open(&log).unwrap();
        fs::remove_file(&log).unwrap();

        assert!(store.load().is_empty());
        store.append(&record(EventType::FileCreated, "/a")).unwrap();
        assert_eq!(store.load().len(), 1);
    }

    #[test]
    fn test_foreign_entries_are_kept() {
        let tmp = TempDir::new().unwrap();
        let log = tmp.path().join("changes.json");
        fs::write(
            &log,
            r#"[{"timestamp": "2024-01-01T10:00:00", "event_type": "file_created", "path": "/old"}]"#,
        )
        .unwrap();

        let mut store = JsonFileStore::open(&log).unwrap();
        store.append(&record(EventType::FileModified, "/new")).unwrap();

        let raw: Vec<Value> = serde_json::from_str(&fs::read_to_string(&log).unwrap()).unwrap();
        assert_eq!(raw.len(), 2);
        assert_eq!(raw[0]["path"], "/old");

        // The naive timestamp has no offset, so only the new record parses.
        assert_eq!(store.load().len(), 1);
    }

    #[test]
    fn test_write_failure_is_reported() {
        let tmp = TempDir::new().unwrap();
        let log = tmp.path().join("changes.json");
        let mut store = JsonFileStore::open(&log).unwrap();

        // The staging path cannot be created once a directory sits there.
        fs::create_dir(store.staging()).unwrap();

        let err = store
            .append(&record(EventType::FileCreated, "/a"))
            .unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Store(StoreError::Write { .. })
        ));
    }

    #[test]
    fn test_memory_store_failures() {
        let mut store = MemoryStore::new();
        store.fail_next(1);

        assert!(store.append(&record(EventType::FileCreated, "/a")).is_err());
        assert!(store.append(&record(EventType::FileCreated, "/a")).is_ok());
        assert_eq!(store.records().len(), 1);
        assert_eq!(store.load().len(), 1);
    }

    #[test]
    fn test_staging_path() {
        assert_eq!(
            staging_path(Path::new("/var/log/changes.json")),
            PathBuf::from("/var/log/changes.json.tmp")
        );
    }
}
