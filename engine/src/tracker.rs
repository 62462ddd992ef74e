//! Registration of directories that appear after startup.
//!
//! Adding a watch waits on the notification thread, and that thread waits on
//! the event channel whenever it is full. Registration therefore runs on its
//! own task, fed by the router, and never on the task draining events.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use autorsync_directory_watcher::TreeWatcher;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::Result;
use crate::mapping::{Mapping, MappingId};

/// Tree watcher shared between engine startup and the tracker.
pub type SharedTreeWatcher = Arc<Mutex<TreeWatcher>>;

/// A directory to register under a mapping's exclusions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackRequest {
    /// Mapping that owns the directory.
    pub mapping: MappingId,

    /// Root of the new subtree.
    pub dir: PathBuf,
}

/// Registers new subtrees with the shared [`TreeWatcher`].
#[derive(Clone)]
pub struct DirectoryTracker {
    mappings: Arc<[Mapping]>,
    watcher: SharedTreeWatcher,
}

impl DirectoryTracker {
    /// Create a tracker over `mappings` registering with `watcher`.
    pub fn new(mappings: Arc<[Mapping]>, watcher: SharedTreeWatcher) -> Self {
        Self { mappings, watcher }
    }

    /// Register one subtree. Returns the number of directories added.
    pub async fn register(&self, request: TrackRequest) -> Result<usize> {
        let Some(mapping) = self.mappings.get(request.mapping.0) else {
            return Ok(0);
        };

        let matcher = mapping.matcher().clone();
        let watcher = self.watcher.clone();

        let registered = tokio::task::spawn_blocking(move || {
            let mut watcher = match watcher.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            watcher.watch_tree(&request.dir, &matcher)
        })
        .await??;

        Ok(registered)
    }

    /// Serve `requests` until the channel closes or `cancel` fires.
    pub async fn run(
        self,
        mut requests: mpsc::UnboundedReceiver<TrackRequest>,
        cancel: CancellationToken,
    ) {
        loop {
            let request = tokio::select! {
                _ = cancel.cancelled() => break,
                request = requests.recv() => match request {
                    Some(request) => request,
                    None => break,
                },
            };

            let dir = request.dir.clone();
            tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.register(request) => match result {
                    Ok(registered) => debug!(
                        "Registered {registered} new directories under {}",
                        dir.display()
                    ),
                    Err(e) => warn!("Failed to watch new directory {}: {e}", dir.display()),
                },
            }
        }

        debug!("Directory tracker stopped");
    }
}
