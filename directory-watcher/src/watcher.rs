//! Recursive tree registration on top of notify.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};
use walkdir::WalkDir;

use crate::error::{Result, WatcherError};
use crate::event::ChangeEvent;
use crate::exclusion::ExclusionMatcher;

/// Capacity of the change event channel. The notify thread blocks once it is
/// full until the consumer catches up.
pub const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Receiving ends of a [`TreeWatcher`].
///
/// Events from every registered tree arrive on one stream; backend errors
/// arrive on a parallel one.
#[derive(Debug)]
pub struct WatchStreams {
    /// Change events.
    pub events: mpsc::Receiver<ChangeEvent>,

    /// Notification backend errors.
    pub errors: mpsc::UnboundedReceiver<WatcherError>,
}

/// Watches directory trees one directory at a time, skipping excluded paths.
///
/// Every non-excluded directory below a root gets its own non-recursive
/// watch, so excluded subtrees never produce events from their own
/// directories. Directories created later are not covered until
/// [`TreeWatcher::watch_tree`] is called for them.
pub struct TreeWatcher {
    /// Internal notify watcher.
    watcher: RecommendedWatcher,

    /// Directories registered so far.
    watched: HashSet<PathBuf>,
}

impl TreeWatcher {
    /// Create a new tree watcher with the default channel capacity.
    pub fn new() -> Result<(Self, WatchStreams)> {
        Self::with_capacity(EVENT_CHANNEL_CAPACITY)
    }

    /// Create a new tree watcher whose event channel holds `capacity` events.
    pub fn with_capacity(capacity: usize) -> Result<(Self, WatchStreams)> {
        let (event_tx, event_rx) = mpsc::channel(capacity.max(1));
        let (error_tx, error_rx) = mpsc::unbounded_channel();

        // The callback runs on notify's own thread, outside any runtime.
        let watcher = notify::recommended_watcher(
            move |res: std::result::Result<notify::Event, notify::Error>| match res {
                Ok(event) => {
                    for change in ChangeEvent::from_notify(event) {
                        if event_tx.blocking_send(change).is_err() {
                            debug!("Event stream closed, dropping change");
                            return;
                        }
                    }
                }
                Err(e) => {
                    if error_tx.send(WatcherError::Notify(e)).is_err() {
                        error!("Error stream closed, dropping watch error");
                    }
                }
            },
        )?;

        let streams = WatchStreams {
            events: event_rx,
            errors: error_rx,
        };

        Ok((
            Self {
                watcher,
                watched: HashSet::new(),
            },
            streams,
        ))
    }

    /// Register every non-excluded directory below `root`, including `root`.
    ///
    /// Fails when `root` is missing, not a directory, unreadable or cannot be
    /// watched. Problems with individual entries further down are logged and
    /// skipped. Returns the number of directories registered by this call.
    pub fn watch_tree(&mut self, root: &Path, matcher: &ExclusionMatcher) -> Result<usize> {
        let metadata = std::fs::metadata(root).map_err(|e| match e.kind() {
            ErrorKind::NotFound => WatcherError::DirectoryNotFound(root.display().to_string()),
            _ => WatcherError::Io(e),
        })?;

        if !metadata.is_dir() {
            return Err(WatcherError::NotADirectory(root.display().to_string()));
        }

        let mut registered = 0;
        let walker = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| !matcher.is_excluded(entry.path()));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => return Err(e.into()),
                Err(e) => {
                    warn!("Skipping unreadable entry under {}: {e}", root.display());
                    continue;
                }
            };

            if !entry.file_type().is_dir() {
                continue;
            }

            let is_root = entry.depth() == 0;
            let path = entry.into_path();

            match self.watcher.watch(&path, RecursiveMode::NonRecursive) {
                Ok(()) => {
                    debug!("Watching: {}", path.display());
                    if self.watched.insert(path) {
                        registered += 1;
                    }
                }
                Err(e) if is_root => return Err(e.into()),
                Err(e) => warn!("Failed to watch {}: {e}", path.display()),
            }
        }

        if registered == 0 {
            debug!("No new directories registered under {}", root.display());
        }

        Ok(registered)
    }

    /// Check if a directory is registered.
    pub fn is_watching(&self, path: &Path) -> bool {
        self.watched.contains(path)
    }

    /// Number of registered directories.
    pub fn watched_count(&self) -> usize {
        self.watched.len()
    }
}
