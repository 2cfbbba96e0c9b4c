//! End-to-end: OS notifications through the engine into the log.

use dirlog::journal::{staging_path, EventLog, EventType, JsonFileStore, LogStore};
use dirlog::watcher::{FileWatcher, PathFilter, WatcherConfig};
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

/// A file created inside the tree is logged, and the log itself is not.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_created_file_reaches_log() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().canonicalize().unwrap();
    let log = root.join("logs/changes.json");

    let store = JsonFileStore::open(&log).unwrap();
    let filter = PathFilter::new(&root)
        .exclude(log.clone())
        .exclude(staging_path(&log));
    let (watcher, mut rx) = FileWatcher::new(&WatcherConfig::new(&root), filter).unwrap();

    let mut engine = EventLog::new(store);
    let stats = engine.stats();
    let task = tokio::task::spawn_blocking(move || {
        engine.run_blocking(&mut rx);
        engine
    });

    let file = root.join("note.txt");
    fs::write(&file, "hello").unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while stats.snapshot().recorded == 0 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    // Let trailing notifications for the same write settle.
    tokio::time::sleep(Duration::from_millis(300)).await;

    drop(watcher);
    let engine = task.await.unwrap();
    let records = engine.store().load();

    let file_path = file.to_string_lossy();
    assert!(
        records
            .iter()
            .any(|r| r.event_type == EventType::FileCreated && r.path == file_path),
        "no file_created for {file_path}: {records:?}"
    );
    assert!(records
        .iter()
        .all(|r| !r.path.starts_with(&*log.to_string_lossy())));
}
