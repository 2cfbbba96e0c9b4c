//! File system watching.
//!
//! This module provides:
//! - Directory watching using notify-rs
//! - Translation of backend events into raw notifications
//! - Exclusion of the log file and ignored paths

mod events;
mod filter;
#[allow(clippy::module_inception)]
mod watcher;

pub use events::{RawEvent, RawEventKind};
pub use filter::PathFilter;
pub use watcher::{spawn_flusher, EventDispatcher, EventTranslator, FileWatcher, WatcherConfig};
