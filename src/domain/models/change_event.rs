//! Filesystem change events and the reload triggers derived from them.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of mutation observed on a registry file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Modified => "modified",
            Self::Deleted => "deleted",
        }
    }

    /// Collapse two successive changes to the same path into the net change.
    ///
    /// `created` then `deleted` still reports `deleted` so the loader notices
    /// the file is gone; `deleted` then `created` (temp-file-then-rename saves)
    /// nets out to `modified`.
    pub fn merge(self, later: Self) -> Self {
        match (self, later) {
            (Self::Created, Self::Modified) => Self::Created,
            (Self::Deleted, Self::Created | Self::Modified) => Self::Modified,
            (_, later) => later,
        }
    }
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One raw filesystem notification, already mapped to a [`ChangeKind`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
    pub observed_at: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn new(path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
            observed_at: Utc::now(),
        }
    }
}

/// Why a reload was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "source")]
pub enum ReloadReason {
    /// Initial load when the server starts.
    Startup,
    /// Explicit full reload requested by an operator or a test.
    Manual,
    /// A debounced burst of filesystem events.
    Filesystem {
        created: usize,
        modified: usize,
        deleted: usize,
    },
}

impl ReloadReason {
    pub fn is_full(&self) -> bool {
        matches!(self, Self::Startup | Self::Manual)
    }

    fn merge(self, other: Self) -> Self {
        match (self, other) {
            (Self::Startup, _) | (_, Self::Startup) => Self::Startup,
            (Self::Manual, _) | (_, Self::Manual) => Self::Manual,
            (
                Self::Filesystem {
                    created,
                    modified,
                    deleted,
                },
                Self::Filesystem {
                    created: c,
                    modified: m,
                    deleted: d,
                },
            ) => Self::Filesystem {
                created: created + c,
                modified: modified + m,
                deleted: deleted + d,
            },
        }
    }
}

impl std::fmt::Display for ReloadReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Startup => write!(f, "startup"),
            Self::Manual => write!(f, "manual"),
            Self::Filesystem {
                created,
                modified,
                deleted,
            } => write!(
                f,
                "filesystem (created={created}, modified={modified}, deleted={deleted})"
            ),
        }
    }
}

/// A coalesced request to reload the registry.
///
/// One trigger may stand for many raw [`ChangeEvent`]s. Each affected path
/// carries its net [`ChangeKind`] over the burst.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadTrigger {
    pub changes: BTreeMap<PathBuf, ChangeKind>,
    pub reason: ReloadReason,
}

impl ReloadTrigger {
    /// A trigger that forces every definition to be re-read.
    pub fn full(reason: ReloadReason) -> Self {
        Self {
            changes: BTreeMap::new(),
            reason,
        }
    }

    /// Build a trigger from a burst of events, preserving arrival order per path.
    pub fn from_events(events: impl IntoIterator<Item = ChangeEvent>) -> Self {
        let mut changes: BTreeMap<PathBuf, ChangeKind> = BTreeMap::new();
        let (mut created, mut modified, mut deleted) = (0, 0, 0);

        for event in events {
            match event.kind {
                ChangeKind::Created => created += 1,
                ChangeKind::Modified => modified += 1,
                ChangeKind::Deleted => deleted += 1,
            }
            changes
                .entry(event.path)
                .and_modify(|kind| *kind = kind.merge(event.kind))
                .or_insert(event.kind);
        }

        Self {
            changes,
            reason: ReloadReason::Filesystem {
                created,
                modified,
                deleted,
            },
        }
    }

    pub fn affected_paths(&self) -> impl Iterator<Item = &Path> {
        self.changes.keys().map(PathBuf::as_path)
    }

    pub fn affects(&self, path: &Path) -> bool {
        self.reason.is_full() || self.changes.contains_key(path)
    }

    /// Fold a later trigger into this one.
    pub fn merge(&mut self, later: Self) {
        for (path, kind) in later.changes {
            self.changes
                .entry(path)
                .and_modify(|existing| *existing = existing.merge(kind))
                .or_insert(kind);
        }
        self.reason = self.reason.merge(later.reason);
    }
}

/// Which mutation kinds the watcher acts upon.
///
/// A disallowed kind is logged and dropped; it is never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct WatcherPolicy {
    #[serde(default = "default_true")]
    pub allow_create: bool,

    #[serde(default = "default_true")]
    pub allow_update: bool,

    #[serde(default = "default_true")]
    pub allow_delete: bool,
}

const fn default_true() -> bool {
    true
}

impl Default for WatcherPolicy {
    fn default() -> Self {
        Self {
            allow_create: true,
            allow_update: true,
            allow_delete: true,
        }
    }
}

impl WatcherPolicy {
    pub fn allows(&self, kind: ChangeKind) -> bool {
        match kind {
            ChangeKind::Created => self.allow_create,
            ChangeKind::Modified => self.allow_update,
            ChangeKind::Deleted => self.allow_delete,
        }
    }
}
