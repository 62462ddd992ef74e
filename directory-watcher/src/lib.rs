//! # Directory Watcher
//!
//! File system monitoring for autorsync. Source trees are registered
//! directory by directory, skipping excluded paths, and every change is
//! delivered on a single shared channel.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Directory Watcher                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ExclusionMatcher ──► TreeWatcher ──► ChangeEvent               │
//! │                           │                                     │
//! │                           ▼                                     │
//! │                 WatchStreams { events, errors }                 │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod event;
pub mod exclusion;
pub mod watcher;

pub use error::{Result, WatcherError};
pub use event::{ChangeEvent, ChangeKind};
pub use exclusion::{ExclusionMatcher, PathMatch};
pub use watcher::{EVENT_CHANNEL_CAPACITY, TreeWatcher, WatchStreams};
