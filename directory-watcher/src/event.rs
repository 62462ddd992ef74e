//! Change events from directory watching.

use std::path::PathBuf;

/// A file system change observed under a watched tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// The kind of change.
    pub kind: ChangeKind,

    /// Path to the affected file or directory.
    pub path: PathBuf,
}

impl ChangeEvent {
    /// Create a new change event.
    pub fn new(kind: ChangeKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }

    /// Expand a notify event into one change event per affected path.
    pub fn from_notify(event: notify::Event) -> Vec<Self> {
        let kind = ChangeKind::from(event.kind);
        event
            .paths
            .into_iter()
            .map(|path| Self::new(kind, path))
            .collect()
    }

    /// Check if this event announces a directory that appeared in the tree,
    /// either created in place or moved in from elsewhere.
    pub fn is_new_directory(&self) -> bool {
        matches!(self.kind, ChangeKind::Created | ChangeKind::RenamedTo) && self.path.is_dir()
    }
}

/// Kind of change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// File or directory was created.
    Created,

    /// File contents were written.
    Written,

    /// File or directory was removed.
    Removed,

    /// Renamed (old path).
    RenamedFrom,

    /// Renamed (new path).
    RenamedTo,

    /// Metadata changed.
    MetadataChanged,

    /// Access only (open, read, close without writing).
    Accessed,

    /// Unknown event type.
    Other,
}

impl ChangeKind {
    /// Check if this kind may have changed the tree's contents.
    pub fn is_modification(self) -> bool {
        !matches!(self, Self::Accessed)
    }
}

impl From<notify::EventKind> for ChangeKind {
    fn from(kind: notify::EventKind) -> Self {
        match kind {
            notify::EventKind::Create(_) => Self::Created,
            notify::EventKind::Modify(modify_kind) => match modify_kind {
                notify::event::ModifyKind::Name(rename) => match rename {
                    notify::event::RenameMode::From => Self::RenamedFrom,
                    notify::event::RenameMode::To => Self::RenamedTo,
                    _ => Self::Written,
                },
                notify::event::ModifyKind::Metadata(_) => Self::MetadataChanged,
                _ => Self::Written,
            },
            notify::EventKind::Remove(_) => Self::Removed,
            // Closing a file opened for writing is the only access that
            // implies new contents.
            notify::EventKind::Access(notify::event::AccessKind::Close(
                notify::event::AccessMode::Write,
            )) => Self::Written,
            notify::EventKind::Access(_) => Self::Accessed,
            _ => Self::Other,
        }
    }
}
