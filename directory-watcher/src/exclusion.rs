//! Exclusion matching for watched trees.
//!
//! Exclusions are plain path fragments, not globs. Each one is anchored to the
//! tree root and a candidate path is excluded when it starts with any anchored
//! exclusion. With the default [`PathMatch::Prefix`] semantics the comparison
//! is a raw string prefix, so `log` also excludes `logfile.txt`.

use std::path::{Component, Path, PathBuf};

use serde::Deserialize;

/// How a path is compared against a prefix path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathMatch {
    /// Raw string prefix: `/a/b` matches `/a/bb/file`.
    #[default]
    Prefix,

    /// Whole path components: `/a/b` matches `/a/b/file` but not `/a/bb/file`.
    Segment,
}

impl PathMatch {
    /// Check whether `path` falls under `prefix`.
    pub fn matches(self, path: &Path, prefix: &Path) -> bool {
        match self {
            Self::Prefix => path
                .to_string_lossy()
                .starts_with(prefix.to_string_lossy().as_ref()),
            Self::Segment => path.starts_with(prefix),
        }
    }
}

/// Decides whether paths under a tree root are excluded.
#[derive(Debug, Clone)]
pub struct ExclusionMatcher {
    /// Root of the watched tree.
    root: PathBuf,

    /// Exclusions anchored to the root.
    exclusions: Vec<PathBuf>,

    /// Comparison semantics.
    mode: PathMatch,
}

impl ExclusionMatcher {
    /// Create a matcher from raw exclusion patterns.
    ///
    /// Patterns already prefixed by `root` are used as-is; everything else is
    /// joined onto `root`, including patterns that start with a separator.
    /// Empty patterns are ignored.
    pub fn new<I, S>(root: impl Into<PathBuf>, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let root = root.into();
        let exclusions = patterns
            .into_iter()
            .filter_map(|pattern| anchor(&root, pattern.as_ref()))
            .collect();

        Self {
            root,
            exclusions,
            mode: PathMatch::default(),
        }
    }

    /// Set the comparison semantics.
    pub fn with_mode(mut self, mode: PathMatch) -> Self {
        self.mode = mode;
        self
    }

    /// The tree root this matcher is anchored to.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The anchored exclusions.
    pub fn exclusions(&self) -> &[PathBuf] {
        &self.exclusions
    }

    /// The comparison semantics in use.
    pub fn mode(&self) -> PathMatch {
        self.mode
    }

    /// Check if a path should be excluded.
    pub fn is_excluded(&self, path: &Path) -> bool {
        self.exclusions
            .iter()
            .any(|exclusion| self.mode.matches(path, exclusion))
    }
}

fn anchor(root: &Path, pattern: &str) -> Option<PathBuf> {
    if pattern.trim().is_empty() {
        return None;
    }

    if pattern.starts_with(root.to_string_lossy().as_ref()) {
        return Some(clean(Path::new(pattern)));
    }

    let relative = pattern.trim_start_matches(std::path::is_separator);
    Some(clean(&root.join(relative)))
}

/// Lexically normalize a path: drop `.` components, fold `..` into the
/// preceding component and strip trailing separators.
fn clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }

    out
}
