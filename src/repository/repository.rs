//! A watched directory tree feeding the indexing coordinator.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use super::replay::RepositoryScan;
use super::scanner::{scan_directory_async, ScanStatsSnapshot};
use crate::error::{Error, WatcherError};
use crate::indexer::{IndexCoordinator, Subscription};
use crate::object::ObjectId;
use crate::paths;
use crate::storage::PathStore;
use crate::watcher::{channel_listener, ChangeWatcher, WatchEvent, WatcherConfig};
use crate::Result;

/// Poll interval while waiting for in-flight runs before cleanup.
const SETTLE_POLL: Duration = Duration::from_millis(10);

/// A directory tree kept in sync with the index.
///
/// Opening a repository watches its root recursively, registers interest in
/// it and scans every existing file. From then on settled writes, creations
/// and removals are turned into dirty signals owned by the repository label.
/// Closing it drops the records that no other open root still covers.
///
/// Must be opened inside a tokio runtime.
pub struct WatchRepository {
    label: String,
    root: PathBuf,
    coordinator: Arc<IndexCoordinator>,
    store: Arc<dyn PathStore>,
    shutdown: CancellationToken,
    scan: Mutex<Option<JoinHandle<Result<ScanStatsSnapshot>>>>,
    rescans: TaskTracker,
    event_loop: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl WatchRepository {
    /// Watch `root` and index it on behalf of `label`.
    ///
    /// `store` must be the store the coordinator's re-index routine writes
    /// to.
    ///
    /// # Errors
    ///
    /// Returns an error if `root` is missing or not a directory, or if the
    /// watcher cannot be created.
    pub fn open(
        label: impl Into<String>,
        root: impl AsRef<Path>,
        coordinator: Arc<IndexCoordinator>,
        store: Arc<dyn PathStore>,
        watcher_config: &WatcherConfig,
    ) -> Result<Self> {
        let label = label.into();
        let root = paths::absolutize(root.as_ref())?;

        let metadata =
            std::fs::metadata(&root).map_err(|e| WatcherError::watch_failed(&root, e))?;
        if !metadata.is_dir() {
            return Err(WatcherError::NotADirectory(root.display().to_string()).into());
        }

        let (listener, events) = channel_listener();
        let watcher = Arc::new(ChangeWatcher::new(watcher_config, listener)?);
        watcher.add(&root, true)?;

        coordinator.acquire(&root);

        let shutdown = CancellationToken::new();
        let rescans = TaskTracker::new();
        let router = Router {
            label: label.clone(),
            coordinator: Arc::clone(&coordinator),
            watcher,
            shutdown: shutdown.clone(),
            rescans: rescans.clone(),
        };
        let event_loop = tokio::spawn(event_loop(events, router));

        let scan = tokio::spawn(scan_directory_async(
            root.clone(),
            label.clone(),
            Arc::clone(&coordinator),
            shutdown.child_token(),
        ));

        tracing::info!(label = %label, root = %root.display(), "Repository opened");

        Ok(Self {
            label,
            root,
            coordinator,
            store,
            shutdown,
            scan: Mutex::new(Some(scan)),
            rescans,
            event_loop: Mutex::new(Some(event_loop)),
            closed: AtomicBool::new(false),
        })
    }

    /// Owner label of this repository's work.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Absolute root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Subscribe to identifiers produced for paths under the root.
    #[must_use]
    pub fn subscribe(&self, token: CancellationToken) -> Subscription {
        self.coordinator.subscribe_under(&self.root, token)
    }

    /// Check whether any file under the root is indexed with `id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be queried.
    pub fn contains(&self, id: &ObjectId) -> Result<bool> {
        self.store.contains_object(&self.root, id)
    }

    /// Replay the identifiers indexed under the root, then keep yielding new
    /// ones if `follow` is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be queried.
    pub fn scan(&self, token: CancellationToken, follow: bool) -> Result<RepositoryScan> {
        let live = follow.then(|| self.subscribe(token.clone()));
        RepositoryScan::new(self.store.as_ref(), &self.root, live, token)
    }

    /// Wait for the initial scan to finish.
    ///
    /// Returns `None` if it was already waited for.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan task failed.
    pub async fn wait_for_scan(&self) -> Result<Option<ScanStatsSnapshot>> {
        let handle = self.scan.lock().take();
        let Some(handle) = handle else {
            return Ok(None);
        };
        let stats = handle
            .await
            .map_err(|e| Error::internal(format!("Scan task failed: {e}")))??;
        Ok(Some(stats))
    }

    /// Stop watching and wait for running scans to stop, then drop pending
    /// work, release the root and delete records no other root covers.
    /// Idempotent.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.shutdown.cancel();
        let event_loop = self.event_loop.lock().take();
        if let Some(event_loop) = event_loop {
            event_loop.abort();
            let _ = event_loop.await;
        }
        let scan = self.scan.lock().take();
        if let Some(scan) = scan {
            if let Ok(Err(e)) = scan.await {
                tracing::debug!(label = %self.label, error = %e, "Initial scan failed");
            }
        }
        self.rescans.close();
        self.rescans.wait().await;

        let dropped = self.detach();
        while self.coordinator.orphaned_work_under(&self.root) > 0 {
            tokio::time::sleep(SETTLE_POLL).await;
        }
        let removed = self.cleanup();

        tracing::info!(label = %self.label, root = %self.root.display(), dropped, removed, "Repository closed");
    }

    fn detach(&self) -> usize {
        let dropped = self.coordinator.drop_owner(&self.label);
        self.coordinator.release(&self.root);
        dropped
    }

    /// Delete records under the root that no registered root covers.
    fn cleanup(&self) -> usize {
        let entries = match self.store.entries_under(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(root = %self.root.display(), error = %e, "Cleanup failed");
                return 0;
            }
        };

        let mut removed = 0;
        for (path, _) in entries {
            if self.coordinator.interest(&path) > 0 {
                continue;
            }
            match self.store.delete(&path) {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to delete record");
                }
            }
        }
        removed
    }
}

impl Drop for WatchRepository {
    /// Best-effort close for repositories dropped without [`close`]: scans
    /// are cancelled but not waited for.
    ///
    /// [`close`]: WatchRepository::close
    fn drop(&mut self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shutdown.cancel();
        if let Some(event_loop) = self.event_loop.get_mut().take() {
            event_loop.abort();
        }
        self.detach();
        self.cleanup();
        tracing::debug!(label = %self.label, "Repository dropped without close");
    }
}

/// Turns watcher events into coordinator calls.
struct Router {
    label: String,
    coordinator: Arc<IndexCoordinator>,
    watcher: Arc<ChangeWatcher>,
    shutdown: CancellationToken,
    rescans: TaskTracker,
}

async fn event_loop(mut events: mpsc::UnboundedReceiver<WatchEvent>, router: Router) {
    loop {
        let event = tokio::select! {
            biased;
            () = router.shutdown.cancelled() => break,
            event = events.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };
        router.route(event);
    }
    tracing::debug!(label = %router.label, "Repository event loop stopped");
}

impl Router {
    fn route(&self, event: WatchEvent) {
        match event {
            WatchEvent::WriteSettled(path)
            | WatchEvent::Created {
                path,
                is_dir: false,
            } => {
                self.coordinator.mark_dirty_owned(&self.label, &path);
            }
            WatchEvent::Created { path, is_dir: true } => self.watch_new_directory(path),
            WatchEvent::Removed { path, cause } => {
                tracing::debug!(path = %path.display(), ?cause, "Path removed");
                self.coordinator.mark_dirty_owned(&self.label, &path);
                if self.watcher.is_watched(&path) {
                    if let Err(e) = self.watcher.remove(&path, true) {
                        tracing::debug!(path = %path.display(), error = %e, "Unwatch failed");
                    }
                }
            }
            WatchEvent::Write(_) | WatchEvent::Chmod(_) => {}
            WatchEvent::Error(e) => {
                tracing::warn!(label = %self.label, error = %e, "Watcher error");
            }
        }
    }

    fn watch_new_directory(&self, path: PathBuf) {
        match self.watcher.add(&path, true) {
            Ok(_) | Err(Error::Watcher(WatcherError::AlreadyWatched(_))) => {}
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to watch new directory");
                return;
            }
        }

        // Files may have landed before the watch was in place.
        self.rescans.spawn(scan_directory_async(
            path,
            self.label.clone(),
            Arc::clone(&self.coordinator),
            self.shutdown.child_token(),
        ));
    }
}
