//! # Sync Engine
//!
//! Watches source trees and mirrors them onto their targets with rsync, at
//! most once per configured interval per mapping.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Sync Engine                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  TreeWatcher ──► EventRouter ──► DirtyState ◄── DispatchScheduler│
//! │                                                     │           │
//! │                                                     ▼           │
//! │                                               SyncExecutor      │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The router and the scheduler run as two tasks sharing one lock around
//! the dirty flags. Many changes to one mapping within an interval collapse
//! into a single sync on the next tick. Directories that appear later are
//! registered by a third task, the `DirectoryTracker`, so the router never
//! waits on the notification backend.

pub mod config;
pub mod dirty;
pub mod engine;
pub mod env;
pub mod error;
pub mod executor;
pub mod mapping;
pub mod router;
pub mod scheduler;
pub mod tracker;

pub use config::{DEFAULT_CONFIG_FILE, EngineConfig};
pub use dirty::DirtyState;
pub use engine::SyncEngine;
pub use error::{EngineError, Result};
pub use executor::{DEFAULT_RSYNC_PATH, RsyncExecutor, SyncExecutor, SyncOutcome, SyncRequest};
pub use mapping::{Mapping, MappingId, Settings};
pub use router::EventRouter;
pub use scheduler::{DispatchScheduler, TickReport};
pub use tracker::{DirectoryTracker, TrackRequest};

pub use autorsync_directory_watcher::{ChangeEvent, ChangeKind, PathMatch, WatchStreams};
