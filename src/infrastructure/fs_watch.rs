//! Filesystem subscription for the registry directory.
//!
//! Wraps `notify`: raw platform events are classified into
//! [`ChangeKind`]s on the watcher's own thread and handed to a callback,
//! which is expected to forward them into a bounded channel.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use notify::event::{EventKind, ModifyKind, RenameMode};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tracing::warn;

use crate::domain::models::ChangeKind;

/// Decides which paths in the registry directory are worth reloading for.
#[derive(Debug, Clone)]
pub struct RegistryPathFilter {
    dir: PathBuf,
    manifest_name: OsString,
    extensions: Vec<String>,
}

impl RegistryPathFilter {
    pub fn new(dir: impl Into<PathBuf>, manifest_name: impl Into<OsString>, extensions: &[String]) -> Self {
        Self {
            dir: dir.into(),
            manifest_name: manifest_name.into(),
            extensions: extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn is_relevant(&self, path: &Path) -> bool {
        if path.parent() != Some(self.dir.as_path()) {
            return false;
        }
        let Some(name) = path.file_name() else {
            return false;
        };
        if name == self.manifest_name.as_os_str() {
            return true;
        }

        let name = name.to_string_lossy();
        if name.starts_with('.') || name.ends_with('~') {
            return false;
        }
        match path.extension() {
            Some(ext) => {
                let ext = ext.to_string_lossy().to_ascii_lowercase();
                self.extensions.iter().any(|allowed| *allowed == ext)
            }
            None => false,
        }
    }
}

/// Map one `notify` event onto registry changes.
///
/// Renames are split: the source path is deleted and the target created.
/// Access and metadata-only events produce nothing.
pub fn classify(event: &notify::Event) -> Vec<(PathBuf, ChangeKind)> {
    let all = |kind: ChangeKind| -> Vec<(PathBuf, ChangeKind)> {
        event.paths.iter().map(|p| (p.clone(), kind)).collect()
    };

    match event.kind {
        EventKind::Create(_) => all(ChangeKind::Created),
        EventKind::Remove(_) => all(ChangeKind::Deleted),
        EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => all(ChangeKind::Deleted),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => all(ChangeKind::Created),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut changes = Vec::with_capacity(2);
            if let Some(from) = event.paths.first() {
                changes.push((from.clone(), ChangeKind::Deleted));
            }
            if let Some(to) = event.paths.get(1) {
                changes.push((to.clone(), ChangeKind::Created));
            }
            changes
        }
        // Backends that cannot tell the two ends of a rename apart
        EventKind::Modify(ModifyKind::Name(_)) => event
            .paths
            .iter()
            .map(|p| {
                let kind = if p.exists() {
                    ChangeKind::Created
                } else {
                    ChangeKind::Deleted
                };
                (p.clone(), kind)
            })
            .collect(),
        EventKind::Modify(_) => all(ChangeKind::Modified),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
    }
}

/// Start watching `dir` (non-recursively).
///
/// `on_change` runs on the watcher's thread for every classified change. The
/// subscription lives as long as the returned watcher.
pub fn watch_directory<F>(dir: &Path, mut on_change: F) -> notify::Result<RecommendedWatcher>
where
    F: FnMut(PathBuf, ChangeKind) + Send + 'static,
{
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<notify::Event>| match res {
            Ok(event) => {
                for (path, kind) in classify(&event) {
                    on_change(path, kind);
                }
            }
            Err(err) => warn!(error = %err, "Filesystem watcher error"),
        },
        notify::Config::default(),
    )?;
    watcher.watch(dir, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}
