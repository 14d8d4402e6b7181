//! File system watcher using notify-rs.

#![allow(clippy::used_underscore_binding)]

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use walkdir::WalkDir;

use super::debounce::WriteDebouncer;
use super::events::{classify, RawChange, RemoveCause, WatchEvent, WatchListener};
use crate::error::WatcherError;
use crate::paths;
use crate::Result;

/// Quiet period after the last write before a file counts as settled.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(3);

/// File watcher configuration.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Quiet period for write debouncing.
    pub write_timeout: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }
}

/// Backend handle plus the set of directories it observes.
struct WatchSet {
    backend: RecommendedWatcher,
    watched: BTreeSet<PathBuf>,
}

/// File system watcher.
///
/// Observes individual directories (non-recursively at the OS level; the
/// `recursive` flag of [`add`](Self::add) expands to every existing
/// subdirectory). Raw notifications are drained by one dispatch task and
/// reported to the listener as [`WatchEvent`]s; write bursts are debounced
/// into a single `WriteSettled`.
///
/// Must be created inside a tokio runtime.
pub struct ChangeWatcher {
    state: Mutex<WatchSet>,
    debouncer: WriteDebouncer,
    _dispatch: JoinHandle<()>,
}

impl ChangeWatcher {
    /// Create a new watcher reporting to `listener`.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no tokio runtime or the OS event
    /// subscription cannot be created.
    pub fn new(config: &WatcherConfig, listener: Arc<dyn WatchListener>) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|e| WatcherError::Runtime(e.to_string()))?;

        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let backend = notify::recommended_watcher(
            move |result: std::result::Result<notify::Event, notify::Error>| {
                // Dispatch task gone means the watcher is shutting down.
                let _ = raw_tx.send(result);
            },
        )
        .map_err(|e| WatcherError::WatchFailed {
            path: "init".to_string(),
            reason: e.to_string(),
        })?;

        let debouncer = WriteDebouncer::new(
            config.write_timeout,
            Arc::clone(&listener),
            runtime.clone(),
        );
        let dispatch = runtime.spawn(dispatch_loop(raw_rx, debouncer.clone(), listener));

        tracing::debug!(
            write_timeout_ms = config.write_timeout.as_millis(),
            "Change watcher started"
        );

        Ok(Self {
            state: Mutex::new(WatchSet {
                backend,
                watched: BTreeSet::new(),
            }),
            debouncer,
            _dispatch: dispatch,
        })
    }

    /// Start watching a directory.
    ///
    /// With `recursive`, every subdirectory existing at call time is watched
    /// too; failures on subdirectories are logged and skipped. Returns the
    /// directories that were newly added.
    ///
    /// # Errors
    ///
    /// Returns an error if the path does not exist, is not a directory, is
    /// already watched, or the backend refuses it.
    pub fn add(&self, path: impl AsRef<Path>, recursive: bool) -> Result<Vec<PathBuf>> {
        let path = paths::absolutize(path.as_ref())?;

        let metadata =
            std::fs::metadata(&path).map_err(|e| WatcherError::watch_failed(&path, e))?;
        if !metadata.is_dir() {
            return Err(WatcherError::NotADirectory(path.display().to_string()).into());
        }

        let subdirs = if recursive {
            list_subdirectories(&path)
        } else {
            Vec::new()
        };

        let mut state = self.state.lock();
        if state.watched.contains(&path) {
            return Err(WatcherError::AlreadyWatched(path.display().to_string()).into());
        }

        state
            .backend
            .watch(&path, RecursiveMode::NonRecursive)
            .map_err(|e| WatcherError::watch_failed(&path, e))?;
        state.watched.insert(path.clone());

        let mut added = vec![path.clone()];
        for dir in subdirs {
            if state.watched.contains(&dir) {
                continue;
            }
            match state.backend.watch(&dir, RecursiveMode::NonRecursive) {
                Ok(()) => {
                    state.watched.insert(dir.clone());
                    added.push(dir);
                }
                Err(e) => {
                    tracing::warn!(path = %dir.display(), error = %e, "Failed to watch subdirectory");
                }
            }
        }
        drop(state);

        tracing::info!(path = %path.display(), directories = added.len(), "Watching directory");
        Ok(added)
    }

    /// Stop watching a directory.
    ///
    /// With `recursive`, every watched directory below it is dropped as well.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not watched.
    pub fn remove(&self, path: impl AsRef<Path>, recursive: bool) -> Result<()> {
        let path = paths::absolutize(path.as_ref())?;

        let mut state = self.state.lock();
        if !state.watched.remove(&path) {
            return Err(WatcherError::NotWatched(path.display().to_string()).into());
        }
        unwatch(&mut state.backend, &path);

        let mut removed = 1;
        if recursive {
            let descendants: Vec<PathBuf> = state
                .watched
                .iter()
                .filter(|watched| paths::contains(&path, watched))
                .cloned()
                .collect();
            for dir in descendants {
                state.watched.remove(&dir);
                unwatch(&mut state.backend, &dir);
                removed += 1;
            }
        }
        drop(state);

        tracing::info!(path = %path.display(), directories = removed, "Stopped watching directory");
        Ok(())
    }

    /// Directories currently watched, sorted.
    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        self.state.lock().watched.iter().cloned().collect()
    }

    /// Check whether `path` is currently watched.
    #[must_use]
    pub fn is_watched(&self, path: &Path) -> bool {
        self.state.lock().watched.contains(&paths::clean(path))
    }
}

impl Drop for ChangeWatcher {
    fn drop(&mut self) {
        self.debouncer.cancel_all();
        self._dispatch.abort();
    }
}

/// Unwatch a directory, tolerating watches the OS already dropped.
fn unwatch(backend: &mut RecommendedWatcher, path: &Path) {
    if let Err(e) = backend.unwatch(path) {
        tracing::debug!(path = %path.display(), error = %e, "Backend unwatch failed");
    }
}

/// All directories below `root`, not following symlinks.
fn list_subdirectories(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) if entry.file_type().is_dir() => Some(entry.into_path()),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(root = %root.display(), error = %e, "Error walking directory");
                None
            }
        })
        .collect()
}

/// Drain backend notifications in order and report them.
async fn dispatch_loop(
    mut raw_rx: mpsc::UnboundedReceiver<std::result::Result<notify::Event, notify::Error>>,
    debouncer: WriteDebouncer,
    listener: Arc<dyn WatchListener>,
) {
    while let Some(result) = raw_rx.recv().await {
        match result {
            Ok(event) => {
                for change in classify(&event) {
                    apply(change, &debouncer, listener.as_ref());
                }
            }
            Err(e) => {
                tracing::error!("Watch error: {:?}", e);
                listener.on_event(WatchEvent::Error(WatcherError::Backend(e.to_string())));
            }
        }
    }
    tracing::debug!("Change watcher dispatch stopped");
}

fn apply(change: RawChange, debouncer: &WriteDebouncer, listener: &dyn WatchListener) {
    match change {
        RawChange::Write(path) => {
            debouncer.on_write(path.clone());
            listener.on_event(WatchEvent::Write(path));
        }
        RawChange::Created(path) => match std::fs::metadata(&path) {
            Ok(metadata) if metadata.is_file() => {
                debouncer.on_write(path.clone());
                listener.on_event(WatchEvent::Created {
                    path,
                    is_dir: false,
                });
            }
            Ok(metadata) if metadata.is_dir() => {
                listener.on_event(WatchEvent::Created { path, is_dir: true });
            }
            Ok(_) => {}
            Err(e) => {
                tracing::trace!(path = %path.display(), error = %e, "Created path vanished");
            }
        },
        RawChange::Removed(path) => {
            debouncer.cancel(&path);
            listener.on_event(WatchEvent::Removed {
                path,
                cause: RemoveCause::Deleted,
            });
        }
        RawChange::RenamedAway(path) => {
            debouncer.cancel(&path);
            listener.on_event(WatchEvent::Removed {
                path,
                cause: RemoveCause::RenamedAway,
            });
        }
        RawChange::Chmod(path) => listener.on_event(WatchEvent::Chmod(path)),
    }
}
