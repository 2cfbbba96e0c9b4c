//! Path exclusion for raw notifications.

use std::path::{Path, PathBuf};

use ignore::gitignore::{Gitignore, GitignoreBuilder};

use super::events::RawEvent;
use crate::Result;

/// Drops notifications that must not reach the event log.
///
/// Always excludes the log file and its staging sibling so that writing the
/// log never feeds back into it. Optional gitignore-style patterns are
/// matched relative to the watch root.
#[derive(Debug)]
pub struct PathFilter {
    base_path: PathBuf,
    gitignore: Option<Gitignore>,
    excluded: Vec<PathBuf>,
}

impl PathFilter {
    /// Create a filter with no ignore patterns.
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
            gitignore: None,
            excluded: Vec::new(),
        }
    }

    /// Create a filter with custom ignore patterns.
    ///
    /// # Errors
    ///
    /// Returns an error if patterns are invalid.
    pub fn with_patterns(base_path: impl AsRef<Path>, patterns: &[&str]) -> Result<Self> {
        let base_path = base_path.as_ref().to_path_buf();
        if patterns.is_empty() {
            return Ok(Self::new(base_path));
        }

        let mut builder = GitignoreBuilder::new(&base_path);
        for pattern in patterns {
            builder
                .add_line(None, pattern)
                .map_err(|e| crate::Error::config(format!("invalid pattern: {e}")))?;
        }

        let gitignore = builder
            .build()
            .map_err(|e| crate::Error::config(format!("failed to build ignore set: {e}")))?;

        Ok(Self {
            base_path,
            gitignore: Some(gitignore),
            excluded: Vec::new(),
        })
    }

    /// Never record events for `path`.
    #[must_use]
    pub fn exclude(mut self, path: impl Into<PathBuf>) -> Self {
        self.excluded.push(path.into());
        self
    }

    /// Check whether a single path is excluded.
    #[must_use]
    pub fn is_excluded(&self, path: &Path, is_dir: bool) -> bool {
        if self.excluded.iter().any(|p| p == path) {
            return true;
        }

        // Gitignore panics on paths outside its root.
        match self.gitignore {
            Some(ref gi) if path.starts_with(&self.base_path) => gi
                .matched_path_or_any_parents(path, is_dir)
                .is_ignore(),
            _ => false,
        }
    }

    /// Check whether a notification should be passed on.
    ///
    /// A move is kept unless both of its ends are excluded.
    #[must_use]
    pub fn allows(&self, event: &RawEvent) -> bool {
        match event.move_paths() {
            Some((from, to)) => {
                !(self.is_excluded(from, event.is_directory)
                    && self.is_excluded(to, event.is_directory))
            }
            None => !self.is_excluded(&event.path, event.is_directory),
        }
    }
}
