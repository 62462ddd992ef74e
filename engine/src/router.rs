//! Attributes change events to mappings and marks them dirty.

use std::path::Path;
use std::sync::Arc;

use autorsync_directory_watcher::{ChangeEvent, WatchStreams};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::dirty::DirtyState;
use crate::mapping::{Mapping, MappingId};
use crate::tracker::TrackRequest;

/// Consumes change events and flags the owning mapping.
///
/// Ownership is decided by the first mapping, in configuration order, whose
/// source is a prefix of the event path. Overlapping roots therefore always
/// resolve to the earlier mapping. Access-only events (opens and reads,
/// including rsync's own walk of the source) are ignored.
#[derive(Clone)]
pub struct EventRouter {
    mappings: Arc<[Mapping]>,
    dirty: DirtyState,
    tracker: Option<mpsc::UnboundedSender<TrackRequest>>,
}

impl EventRouter {
    /// Create a router over `mappings` writing to `dirty`.
    pub fn new(mappings: Arc<[Mapping]>, dirty: DirtyState) -> Self {
        Self {
            mappings,
            dirty,
            tracker: None,
        }
    }

    /// Hand directories that appear after startup to a
    /// [`DirectoryTracker`](crate::tracker::DirectoryTracker) through `requests`.
    pub fn with_tracker(mut self, requests: mpsc::UnboundedSender<TrackRequest>) -> Self {
        self.tracker = Some(requests);
        self
    }

    /// Find the mapping that owns `path`.
    pub fn attribute(&self, path: &Path) -> Option<MappingId> {
        self.mappings
            .iter()
            .position(|mapping| mapping.owns(path))
            .map(MappingId)
    }

    /// Route one event. Returns the mapping it was attributed to.
    pub async fn route(&self, event: &ChangeEvent) -> Option<MappingId> {
        debug!(
            "[event] detected change to {} ({:?})",
            event.path.display(),
            event.kind
        );

        if !event.kind.is_modification() {
            return None;
        }

        let Some(id) = self.attribute(&event.path) else {
            warn!("No mapping owns {}, dropping event", event.path.display());
            return None;
        };

        if event.is_new_directory() {
            self.track(id, &event.path);
        }

        if self.dirty.mark(id).await {
            debug!("Mapping {id} marked dirty");
        }

        Some(id)
    }

    /// Consume `streams` until they close or `cancel` fires.
    pub async fn run(self, mut streams: WatchStreams, cancel: CancellationToken) {
        let mut errors_open = true;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                event = streams.events.recv() => match event {
                    Some(event) => {
                        self.route(&event).await;
                    }
                    None => {
                        info!("Event stream closed");
                        break;
                    }
                },
                err = streams.errors.recv(), if errors_open => match err {
                    Some(e) => error!("[error] {e}"),
                    None => errors_open = false,
                },
            }
        }

        debug!("Event router stopped");
    }

    fn track(&self, id: MappingId, dir: &Path) {
        let (Some(tracker), Some(mapping)) = (&self.tracker, self.mappings.get(id.0)) else {
            return;
        };

        if mapping.matcher().is_excluded(dir) {
            return;
        }

        let request = TrackRequest {
            mapping: id,
            dir: dir.to_path_buf(),
        };
        if tracker.send(request).is_err() {
            debug!("Directory tracker gone, not watching {}", dir.display());
        }
    }
}
