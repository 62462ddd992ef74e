//! Error types for the sync engine.

use autorsync_directory_watcher::WatcherError;
use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that can occur while configuring or running the engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Interval could not be parsed or is zero.
    #[error("failed to parse interval {input:?}: {reason}")]
    InvalidInterval { input: String, reason: String },

    /// Watcher error.
    #[error(transparent)]
    Watcher(#[from] WatcherError),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("failed to parse config file: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A background loop panicked.
    #[error("engine task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
