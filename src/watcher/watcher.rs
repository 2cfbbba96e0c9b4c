//! File system watcher using notify-rs.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::events::RawEvent;
use super::filter::PathFilter;
use crate::error::WatcherError;
use crate::Result;

/// How long a rename source waits for its destination.
const PAIRING_WINDOW: Duration = Duration::from_millis(500);

/// How often unpaired rename sources are checked for expiry.
const FLUSH_INTERVAL: Duration = Duration::from_millis(250);

/// Raw events buffered between the OS watcher and the engine.
const CHANNEL_CAPACITY: usize = 1024;

/// File watcher configuration.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Directory tree to watch.
    pub watch_dir: PathBuf,
    /// How long an unpaired rename source is held before it counts as a delete.
    pub pairing_window: Duration,
    /// How often held rename sources are checked.
    pub flush_interval: Duration,
    /// Capacity of the raw event channel.
    pub channel_capacity: usize,
}

impl WatcherConfig {
    /// Configuration for `watch_dir` with default tuning.
    pub fn new(watch_dir: impl Into<PathBuf>) -> Self {
        Self {
            watch_dir: watch_dir.into(),
            pairing_window: PAIRING_WINDOW,
            flush_interval: FLUSH_INTERVAL,
            channel_capacity: CHANNEL_CAPACITY,
        }
    }
}

#[derive(Debug)]
struct PendingRename {
    from: PathBuf,
    to: Option<PathBuf>,
    is_dir: bool,
    since: Instant,
}

/// Turns notify events into raw notifications.
///
/// Backends report renames differently: inotify sends `From`, `To` and then a
/// combined `Both` sharing one tracker, Windows sends an untracked `From`/`To`
/// pair, and FSEvents sends single-path `Any`. Sources are held here until
/// their destination shows up or the pairing window runs out. A held source
/// is released early when a later event touches its path, so per-path order
/// is kept.
///
/// Directories seen while watching are remembered, since a path that is
/// already gone can no longer be asked whether it was one.
#[derive(Debug)]
pub struct EventTranslator {
    pending: HashMap<Option<usize>, PendingRename>,
    dirs: HashSet<PathBuf>,
    window: Duration,
}

impl EventTranslator {
    /// Create a translator with the given pairing window.
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            pending: HashMap::new(),
            dirs: HashSet::new(),
            window,
        }
    }

    /// Translate one notify event observed at `now`.
    ///
    /// Expired rename sources are flushed first so output stays in order.
    pub fn translate(&mut self, event: Event, now: Instant) -> Vec<RawEvent> {
        let mut out = self.expire(now);
        let tracker = event.tracker();
        let mut paths = event.paths;

        match event.kind {
            EventKind::Create(kind) => {
                for path in paths {
                    self.settle(&path, &mut out);
                    let is_dir = kind == CreateKind::Folder || path.is_dir();
                    if is_dir {
                        self.dirs.insert(path.clone());
                    }
                    out.push(RawEvent::created(path, is_dir));
                }
            }
            EventKind::Remove(kind) => {
                for path in paths {
                    self.settle(&path, &mut out);
                    let is_dir = kind == RemoveKind::Folder || self.dirs.contains(&path);
                    self.forget(&path);
                    out.push(RawEvent::deleted(path, is_dir));
                }
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if paths.len() >= 2 => {
                self.pending.remove(&tracker);
                let to = paths.swap_remove(1);
                let from = paths.swap_remove(0);
                self.settle(&to, &mut out);
                out.push(self.moved(from, to, false));
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
                for from in paths {
                    let pending = PendingRename {
                        is_dir: self.dirs.contains(&from),
                        from,
                        to: None,
                        since: now,
                    };
                    if let Some(stale) = self.pending.insert(tracker, pending) {
                        out.push(self.resolve(stale));
                    }
                }
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
                for to in paths {
                    self.settle(&to, &mut out);
                    match self.pending.remove(&tracker) {
                        // inotify follows up with `Both` in the same batch;
                        // keep the pair until then.
                        Some(mut pending) if tracker.is_some() => {
                            pending.to = Some(to);
                            self.pending.insert(tracker, pending);
                        }
                        Some(pending) => {
                            out.push(self.moved(pending.from, to, pending.is_dir));
                        }
                        None => {
                            let is_dir = to.is_dir();
                            if is_dir {
                                self.dirs.insert(to.clone());
                            }
                            out.push(RawEvent::created(to, is_dir));
                        }
                    }
                }
            }
            EventKind::Modify(ModifyKind::Name(_)) => {
                if paths.len() >= 2 {
                    let to = paths.swap_remove(1);
                    let from = paths.swap_remove(0);
                    self.settle(&to, &mut out);
                    out.push(self.moved(from, to, false));
                } else {
                    for path in paths {
                        self.settle(&path, &mut out);
                        if path.exists() {
                            let is_dir = path.is_dir();
                            if is_dir {
                                self.dirs.insert(path.clone());
                            }
                            out.push(RawEvent::created(path, is_dir));
                        } else {
                            let is_dir = self.dirs.contains(&path);
                            self.forget(&path);
                            out.push(RawEvent::deleted(path, is_dir));
                        }
                    }
                }
            }
            EventKind::Modify(_) => {
                for path in paths {
                    self.settle(&path, &mut out);
                    let is_dir = path.is_dir();
                    if is_dir {
                        self.dirs.insert(path.clone());
                    }
                    out.push(RawEvent::modified(path, is_dir));
                }
            }
            EventKind::Access(_) | EventKind::Any | EventKind::Other => {}
        }

        out
    }

    /// Flush rename sources older than the pairing window.
    pub fn expire(&mut self, now: Instant) -> Vec<RawEvent> {
        let window = self.window;
        let keys = self.pending_keys(|p| now.saturating_duration_since(p.since) >= window);
        self.resolve_keys(keys)
    }

    /// Number of rename sources waiting for a destination.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Release held sources at or above `path` before an event on `path`.
    ///
    /// Only unpaired sources qualify: a paired one is completed by the `Both`
    /// that inotify emits right after its `To`.
    fn settle(&mut self, path: &Path, out: &mut Vec<RawEvent>) {
        let keys = self.pending_keys(|p| p.to.is_none() && path.starts_with(&p.from));
        out.extend(self.resolve_keys(keys));
    }

    fn pending_keys(&self, pred: impl Fn(&PendingRename) -> bool) -> Vec<Option<usize>> {
        let mut keys: Vec<(Option<usize>, Instant)> = self
            .pending
            .iter()
            .filter(|(_, p)| pred(p))
            .map(|(k, p)| (*k, p.since))
            .collect();
        keys.sort_by_key(|(_, since)| *since);
        keys.into_iter().map(|(k, _)| k).collect()
    }

    fn resolve_keys(&mut self, keys: Vec<Option<usize>>) -> Vec<RawEvent> {
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(pending) = self.pending.remove(&key) {
                out.push(self.resolve(pending));
            }
        }
        out
    }

    fn resolve(&mut self, pending: PendingRename) -> RawEvent {
        match pending.to {
            Some(to) => self.moved(pending.from, to, pending.is_dir),
            // Moved out of the tree.
            None => {
                self.forget(&pending.from);
                RawEvent::deleted(pending.from, pending.is_dir)
            }
        }
    }

    fn moved(&mut self, from: PathBuf, to: PathBuf, known_dir: bool) -> RawEvent {
        let is_dir = known_dir || to.is_dir() || self.dirs.contains(&from);
        if is_dir {
            self.relocate(&from, &to);
        }
        RawEvent::moved(from, to, is_dir)
    }

    fn forget(&mut self, path: &Path) {
        self.dirs.retain(|d| !d.starts_with(path));
    }

    fn relocate(&mut self, from: &Path, to: &Path) {
        let moved: Vec<PathBuf> = self
            .dirs
            .iter()
            .filter(|d| d.starts_with(from))
            .cloned()
            .collect();
        for dir in moved {
            self.dirs.remove(&dir);
            if let Ok(rest) = dir.strip_prefix(from) {
                self.dirs.insert(to.join(rest));
            }
        }
        self.dirs.insert(to.to_path_buf());
    }
}

/// Single delivery point from the translator to the event channel.
///
/// Sends happen while the translator lock is held, so the channel sees events
/// in the order the translator produced them no matter which thread drives
/// it. Must not be called from inside an async runtime.
#[derive(Debug)]
pub struct EventDispatcher {
    translator: Mutex<EventTranslator>,
    filter: PathFilter,
    event_tx: mpsc::Sender<RawEvent>,
}

impl EventDispatcher {
    /// Create a dispatcher sending into `event_tx`.
    #[must_use]
    pub fn new(
        translator: EventTranslator,
        filter: PathFilter,
        event_tx: mpsc::Sender<RawEvent>,
    ) -> Self {
        Self {
            translator: Mutex::new(translator),
            filter,
            event_tx,
        }
    }

    /// Translate and deliver one notify event.
    ///
    /// # Errors
    ///
    /// Returns an error if the event receiver has been dropped.
    pub fn dispatch(&self, event: Event, now: Instant) -> Result<()> {
        let mut translator = self.translator.lock();
        let raw = translator.translate(event, now);
        self.deliver(raw)
    }

    /// Deliver rename sources whose destination never arrived.
    ///
    /// # Errors
    ///
    /// Returns an error if the event receiver has been dropped.
    pub fn flush(&self, now: Instant) -> Result<()> {
        let mut translator = self.translator.lock();
        let raw = translator.expire(now);
        self.deliver(raw)
    }

    fn deliver(&self, events: Vec<RawEvent>) -> Result<()> {
        for event in events.into_iter().filter(|e| self.filter.allows(e)) {
            self.event_tx
                .blocking_send(event)
                .map_err(|_| WatcherError::ChannelClosed)?;
        }
        Ok(())
    }
}

/// Periodically flush expired rename sources on a dedicated thread.
///
/// The thread stops when the returned sender is dropped or the event
/// receiver goes away.
///
/// # Errors
///
/// Returns an error if the thread cannot be spawned.
pub fn spawn_flusher(
    dispatcher: Arc<EventDispatcher>,
    interval: Duration,
) -> Result<(Sender<()>, JoinHandle<()>)> {
    let (stop_tx, stop_rx) = bounded::<()>(1);

    let handle = thread::Builder::new()
        .name("dirlog-rename-flush".to_string())
        .spawn(move || loop {
            match stop_rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => {
                    if let Err(e) = dispatcher.flush(Instant::now()) {
                        tracing::debug!("Stopping rename flush: {e}");
                        break;
                    }
                }
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        })?;

    Ok((stop_tx, handle))
}

/// File system watcher feeding raw notifications to a channel.
pub struct FileWatcher {
    watcher: RecommendedWatcher,
    _flush_stop: Sender<()>,
    watch_dir: PathBuf,
}

impl FileWatcher {
    /// Create a watcher over `config.watch_dir`.
    ///
    /// Returns the watcher together with the receiving end of its event
    /// channel. Events stop once the watcher is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the watcher cannot be created or the directory
    /// cannot be watched.
    pub fn new(
        config: &WatcherConfig,
        filter: PathFilter,
    ) -> Result<(Self, mpsc::Receiver<RawEvent>)> {
        let (event_tx, event_rx) = mpsc::channel(config.channel_capacity);
        let dispatcher = Arc::new(EventDispatcher::new(
            EventTranslator::new(config.pairing_window),
            filter,
            event_tx,
        ));

        let callback_dispatcher = Arc::clone(&dispatcher);
        let watcher = notify::recommended_watcher(
            move |result: std::result::Result<Event, notify::Error>| match result {
                Ok(event) => {
                    if let Err(e) = callback_dispatcher.dispatch(event, Instant::now()) {
                        tracing::debug!("Discarding notification: {e}");
                    }
                }
                Err(e) => {
                    tracing::error!("Watch error: {:?}", e);
                }
            },
        )
        .map_err(|e| WatcherError::WatchFailed {
            path: "init".to_string(),
            reason: e.to_string(),
        })?;

        let (flush_stop, _flusher) = spawn_flusher(dispatcher, config.flush_interval)?;

        let mut watcher = Self {
            watcher,
            _flush_stop: flush_stop,
            watch_dir: config.watch_dir.clone(),
        };
        watcher.start()?;

        Ok((watcher, event_rx))
    }

    fn start(&mut self) -> Result<()> {
        let path = self.watch_dir.clone();

        if !path.is_dir() {
            return Err(WatcherError::WatchFailed {
                path: path.display().to_string(),
                reason: "directory does not exist".to_string(),
            }
            .into());
        }

        self.watcher
            .watch(&path, RecursiveMode::Recursive)
            .map_err(|e| WatcherError::WatchFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        tracing::info!(path = %path.display(), "Watching directory");
        Ok(())
    }

    /// The watched root.
    #[must_use]
    pub fn watch_dir(&self) -> &Path {
        &self.watch_dir
    }
}
