//! Interval-driven dispatch of dirty mappings.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::dirty::DirtyState;
use crate::executor::{SyncExecutor, SyncRequest};
use crate::mapping::{Mapping, Settings};

/// What a single tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Syncs issued.
    pub dispatched: usize,

    /// Syncs that reported failure.
    pub failed: usize,
}

/// Turns dirty flags into sync calls once per interval.
///
/// The dirty-state lock is held for the whole pass, so syncs for several
/// mappings in one tick run one after another and the router waits until
/// the pass is over. A flag is cleared only after its sync has returned,
/// whatever the outcome.
#[derive(Clone)]
pub struct DispatchScheduler {
    mappings: Arc<[Mapping]>,
    settings: Arc<Settings>,
    dirty: DirtyState,
    executor: Arc<dyn SyncExecutor>,
}

impl DispatchScheduler {
    /// Create a new scheduler.
    pub fn new(
        mappings: Arc<[Mapping]>,
        settings: Arc<Settings>,
        dirty: DirtyState,
        executor: Arc<dyn SyncExecutor>,
    ) -> Self {
        Self {
            mappings,
            settings,
            dirty,
            executor,
        }
    }

    /// Run one scan-and-dispatch pass.
    pub async fn tick(&self) -> TickReport {
        let mut report = TickReport::default();
        let mut flags = self.dirty.lock().await;

        for id in flags.dirty() {
            let Some(mapping) = self.mappings.get(id.0) else {
                flags.clear(id);
                continue;
            };

            let request = SyncRequest::new(mapping, &self.settings);
            let outcome = self.executor.sync(&request).await;
            report.dispatched += 1;

            if outcome.success {
                info!(
                    "Synced {} to {} in {}ms",
                    mapping.source.display(),
                    mapping.target,
                    outcome.duration_ms
                );
                if !outcome.stdout.is_empty() {
                    info!("{}", outcome.stdout.trim_end());
                }
            } else {
                report.failed += 1;
                error!(
                    "[error] sync of {} to {} failed: {}",
                    mapping.source.display(),
                    mapping.target,
                    outcome.error.as_deref().unwrap_or("unknown error")
                );
                if !outcome.stderr.is_empty() {
                    error!("{}", outcome.stderr.trim_end());
                }
            }

            flags.clear(id);
        }

        report
    }

    /// Tick every interval until `cancel` fires. The first tick happens one
    /// interval after the call. A pass already in progress when `cancel` fires
    /// runs to completion.
    pub async fn run(self, cancel: CancellationToken) {
        // tokio rejects a zero period.
        let period = self.settings.interval.max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let report = self.tick().await;
                    if report.dispatched > 0 {
                        debug!(
                            "Tick dispatched {} syncs ({} failed)",
                            report.dispatched, report.failed
                        );
                    }
                }
            }
        }

        debug!("Dispatch scheduler stopped");
    }
}
