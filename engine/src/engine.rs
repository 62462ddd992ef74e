//! Engine lifecycle: register trees, then run the router and the scheduler.

use std::sync::{Arc, Mutex};

use autorsync_directory_watcher::TreeWatcher;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::EngineConfig;
use crate::dirty::DirtyState;
use crate::error::{EngineError, Result};
use crate::executor::SyncExecutor;
use crate::mapping::Mapping;
use crate::router::EventRouter;
use crate::scheduler::DispatchScheduler;
use crate::tracker::{DirectoryTracker, SharedTreeWatcher};

/// A running sync engine.
///
/// The background loops (router, scheduler and, when new directories are
/// tracked, the directory tracker) share one cancellation token. When any
/// loop ends on its own (for example because the event stream closed) it
/// cancels the others, so [`SyncEngine::stopped`] resolves.
pub struct SyncEngine {
    cancel: CancellationToken,
    router: JoinHandle<()>,
    scheduler: JoinHandle<()>,
    tracker: Option<JoinHandle<()>>,
    watcher: SharedTreeWatcher,
    dirty: DirtyState,
    mappings: Arc<[Mapping]>,
}

impl SyncEngine {
    /// Register every mapping's tree and start both loops.
    ///
    /// Must be called from within a tokio runtime. Fails without starting
    /// anything if any tree cannot be registered.
    pub fn start(config: EngineConfig, executor: Arc<dyn SyncExecutor>) -> Result<Self> {
        if config.mappings.is_empty() {
            return Err(EngineError::Config("no mappings configured".to_string()));
        }

        let (mut watcher, streams) = TreeWatcher::new()?;

        for mapping in &config.mappings {
            info!(
                "syncing {} to {}",
                mapping.source.display(),
                mapping.target
            );
            let registered = watcher.watch_tree(&mapping.source, mapping.matcher())?;
            info!(
                "Watching {registered} directories under {}",
                mapping.source.display()
            );
        }

        let mappings: Arc<[Mapping]> = config.mappings.into();
        let settings = Arc::new(config.settings);
        let dirty = DirtyState::new(mappings.len());
        let watcher: SharedTreeWatcher = Arc::new(Mutex::new(watcher));
        let cancel = CancellationToken::new();

        let mut router = EventRouter::new(mappings.clone(), dirty.clone());
        let mut tracker = None;
        if settings.track_new_directories {
            let (requests_tx, requests_rx) = mpsc::unbounded_channel();
            router = router.with_tracker(requests_tx);

            let directories = DirectoryTracker::new(mappings.clone(), watcher.clone());
            let cancel = cancel.clone();
            tracker = Some(tokio::spawn(async move {
                directories.run(requests_rx, cancel.clone()).await;
                cancel.cancel();
            }));
        }

        let scheduler =
            DispatchScheduler::new(mappings.clone(), settings, dirty.clone(), executor);

        let router = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                router.run(streams, cancel.clone()).await;
                cancel.cancel();
            })
        };

        let scheduler = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                scheduler.run(cancel.clone()).await;
                cancel.cancel();
            })
        };

        info!("Sync engine started");

        Ok(Self {
            cancel,
            router,
            scheduler,
            tracker,
            watcher,
            dirty,
            mappings,
        })
    }

    /// Mappings in configuration order.
    pub fn mappings(&self) -> &[Mapping] {
        &self.mappings
    }

    /// Shared dirty flags.
    pub fn dirty_state(&self) -> &DirtyState {
        &self.dirty
    }

    /// Number of directories currently registered. Waits for a registration
    /// in progress.
    pub fn watched_directories(&self) -> usize {
        match self.watcher.lock() {
            Ok(watcher) => watcher.watched_count(),
            Err(poisoned) => poisoned.into_inner().watched_count(),
        }
    }

    /// Token that stops both loops when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Resolve once the engine has been asked to stop or a loop has ended.
    pub async fn stopped(&self) {
        self.cancel.cancelled().await;
    }

    /// Stop every loop and wait for them. A sync already running finishes
    /// first.
    pub async fn shutdown(self) -> Result<()> {
        self.cancel.cancel();
        self.router.await?;
        self.scheduler.await?;
        if let Some(tracker) = self.tracker {
            tracker.await?;
        }
        info!("Sync engine stopped");
        Ok(())
    }
}
