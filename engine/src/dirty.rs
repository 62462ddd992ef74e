//! Per-mapping "needs sync" flags shared by the router and the scheduler.

use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};

use crate::mapping::MappingId;

/// One boolean flag per configured mapping behind a single lock.
///
/// The set of flags is fixed at construction; only their values change.
#[derive(Debug, Clone)]
pub struct DirtyState {
    flags: Arc<Mutex<Vec<bool>>>,

    /// Cached flag count so `len` never waits on the lock.
    len: usize,
}

impl DirtyState {
    /// Create clean flags for `mappings` mappings.
    pub fn new(mappings: usize) -> Self {
        Self {
            flags: Arc::new(Mutex::new(vec![false; mappings])),
            len: mappings,
        }
    }

    /// Number of tracked mappings.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if no mappings are tracked.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Mark a mapping dirty. Returns `true` if it was clean before.
    pub async fn mark(&self, id: MappingId) -> bool {
        let mut flags = self.flags.lock().await;
        match flags.get_mut(id.0) {
            Some(flag) => !std::mem::replace(flag, true),
            None => false,
        }
    }

    /// Check whether a mapping is dirty.
    pub async fn is_dirty(&self, id: MappingId) -> bool {
        self.flags.lock().await.get(id.0).copied().unwrap_or(false)
    }

    /// Copy of all flags in mapping order.
    pub async fn snapshot(&self) -> Vec<bool> {
        self.flags.lock().await.clone()
    }

    /// Take the lock for a scan-and-dispatch pass.
    pub async fn lock(&self) -> DirtyGuard<'_> {
        DirtyGuard {
            flags: self.flags.lock().await,
        }
    }
}

/// Exclusive access to every flag for the duration of a dispatch pass.
pub struct DirtyGuard<'a> {
    flags: MutexGuard<'a, Vec<bool>>,
}

impl DirtyGuard<'_> {
    /// Mappings currently marked dirty, in configuration order.
    pub fn dirty(&self) -> Vec<MappingId> {
        self.flags
            .iter()
            .enumerate()
            .filter(|(_, dirty)| **dirty)
            .map(|(index, _)| MappingId(index))
            .collect()
    }

    /// Reset a mapping's flag.
    pub fn clear(&mut self, id: MappingId) {
        if let Some(flag) = self.flags.get_mut(id.0) {
            *flag = false;
        }
    }
}
