//! The event log engine and its persistence.
//!
//! This module provides:
//! - Classification of raw notifications into event types
//! - Suppression of create-then-modify noise
//! - Metadata snapshots with content hashes
//! - An append-only JSON log store

mod classify;
mod dedup;
mod engine;
mod records;
mod snapshot;
mod store;

pub use classify::classify;
pub use dedup::DedupTable;
pub use engine::{EngineStats, EngineStatsSnapshot, EventLog, Outcome};
pub use records::{Details, EventRecord, EventType, Metadata};
pub use snapshot::{capture, md5_file};
pub use store::{staging_path, JsonFileStore, LogStore, MemoryStore};
