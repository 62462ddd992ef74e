//! Mappings and global sync settings.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use autorsync_directory_watcher::{ExclusionMatcher, PathMatch};

/// Position of a mapping in configuration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MappingId(pub usize);

impl fmt::Display for MappingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One source tree mirrored onto one target.
#[derive(Debug, Clone)]
pub struct Mapping {
    /// Root of the watched tree.
    pub source: PathBuf,

    /// Destination passed through to rsync untouched.
    pub target: String,

    /// Exclusions as configured, including the config file itself.
    pub exclusions: Vec<String>,

    /// Exclusions anchored to `source`.
    matcher: ExclusionMatcher,
}

impl Mapping {
    /// Create a new mapping with prefix matching.
    pub fn new(
        source: impl Into<PathBuf>,
        target: impl Into<String>,
        exclusions: Vec<String>,
    ) -> Self {
        let source = source.into();
        let matcher = ExclusionMatcher::new(source.clone(), &exclusions);

        Self {
            source,
            target: target.into(),
            exclusions,
            matcher,
        }
    }

    /// Set how paths are compared for both exclusion and ownership.
    pub fn with_path_match(mut self, mode: PathMatch) -> Self {
        self.matcher = self.matcher.with_mode(mode);
        self
    }

    /// The anchored exclusion matcher.
    pub fn matcher(&self) -> &ExclusionMatcher {
        &self.matcher
    }

    /// Check whether a path lies under this mapping's source.
    pub fn owns(&self, path: &Path) -> bool {
        self.matcher.mode().matches(path, &self.source)
    }
}

/// Settings shared by every mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Time between dispatch ticks.
    pub interval: Duration,

    /// Arguments forwarded to every rsync invocation.
    pub extra_args: Vec<String>,

    /// Path comparison semantics.
    pub path_match: PathMatch,

    /// Register directories created after startup.
    pub track_new_directories: bool,
}

impl Settings {
    /// Create settings with the given interval and defaults elsewhere.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            extra_args: Vec::new(),
            path_match: PathMatch::default(),
            track_new_directories: true,
        }
    }

    /// Set the forwarded rsync arguments.
    pub fn with_extra_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    /// Set the path comparison semantics.
    pub fn with_path_match(mut self, mode: PathMatch) -> Self {
        self.path_match = mode;
        self
    }

    /// Disable registration of directories created after startup.
    pub fn without_directory_tracking(mut self) -> Self {
        self.track_new_directories = false;
        self
    }
}
