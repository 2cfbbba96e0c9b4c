//! dirlog library
//!
//! Records file system changes under a watched directory as an ordered,
//! append-only JSON log, with per-event metadata snapshots.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod journal;
pub mod observability;
pub mod watcher;

pub use config::Config;
pub use error::{Error, Result};
