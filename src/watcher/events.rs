//! File system event types and listener plumbing.

#![allow(clippy::missing_const_for_fn)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::event::{EventKind, ModifyKind, RenameMode};
use tokio::sync::mpsc;

use crate::error::WatcherError;

/// Why a path disappeared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveCause {
    /// The path was deleted.
    Deleted,
    /// The path was renamed to something else.
    RenamedAway,
}

/// Semantic event produced by the [`ChangeWatcher`](super::ChangeWatcher).
#[derive(Debug)]
pub enum WatchEvent {
    /// A raw write was observed. Fires for every write in a burst.
    Write(PathBuf),
    /// No write arrived for the quiet period after the last one.
    WriteSettled(PathBuf),
    /// A file or directory appeared.
    Created { path: PathBuf, is_dir: bool },
    /// A path was deleted or renamed away.
    Removed { path: PathBuf, cause: RemoveCause },
    /// Permissions or other metadata changed.
    Chmod(PathBuf),
    /// The event backend reported an error. The watcher keeps running.
    Error(WatcherError),
}

impl WatchEvent {
    /// Path this event is about, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Write(path)
            | Self::WriteSettled(path)
            | Self::Chmod(path)
            | Self::Created { path, .. }
            | Self::Removed { path, .. } => Some(path),
            Self::Error(_) => None,
        }
    }
}

/// Receiver of watcher events.
///
/// Called from the dispatch task and from debounce timers, possibly
/// concurrently, so implementations must not block for long.
pub trait WatchListener: Send + Sync + 'static {
    /// Handle one event.
    fn on_event(&self, event: WatchEvent);
}

impl<F> WatchListener for F
where
    F: Fn(WatchEvent) + Send + Sync + 'static,
{
    fn on_event(&self, event: WatchEvent) {
        self(event);
    }
}

/// Create a listener that forwards every event into an unbounded channel.
#[must_use]
pub fn channel_listener() -> (Arc<dyn WatchListener>, mpsc::UnboundedReceiver<WatchEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let listener = move |event: WatchEvent| {
        // Receiver gone means nobody cares any more.
        let _ = tx.send(event);
    };
    (Arc::new(listener), rx)
}

/// Low-level change extracted from a backend event, before debouncing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RawChange {
    Write(PathBuf),
    Created(PathBuf),
    Removed(PathBuf),
    RenamedAway(PathBuf),
    Chmod(PathBuf),
}

/// Translate a `notify` event into raw changes.
///
/// Access events are ignored. Renames that only report one side are resolved
/// by checking whether the path still exists.
pub(crate) fn classify(event: &notify::Event) -> Vec<RawChange> {
    let paths = event.paths.iter().cloned();
    match event.kind {
        EventKind::Create(_) => paths.map(RawChange::Created).collect(),
        EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Any | ModifyKind::Other) => {
            paths.map(RawChange::Write).collect()
        }
        EventKind::Modify(ModifyKind::Metadata(_)) => paths.map(RawChange::Chmod).collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            paths.map(RawChange::RenamedAway).collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            paths.map(RawChange::Created).collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut changes = Vec::with_capacity(event.paths.len());
            let mut iter = event.paths.iter();
            if let Some(from) = iter.next() {
                changes.push(RawChange::RenamedAway(from.clone()));
            }
            changes.extend(iter.cloned().map(RawChange::Created));
            changes
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Any | RenameMode::Other)) => paths
            .map(|path| {
                if path.exists() {
                    RawChange::Created(path)
                } else {
                    RawChange::RenamedAway(path)
                }
            })
            .collect(),
        EventKind::Remove(_) => paths.map(RawChange::Removed).collect(),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
    }
}
