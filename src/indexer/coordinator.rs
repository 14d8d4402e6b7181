//! Indexing coordinator: deduplicated, interest-gated re-index scheduling.

use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use super::reindex::Reindex;
use super::state::{Claim, CompleteOutcome, MarkOutcome, PathWorkState, WorkTable};
use super::stats::{CoordinatorStats, CoordinatorStatsSnapshot};
use super::subscription::{IndexEvent, Subscription};
use crate::error::IndexError;
use crate::object::ObjectId;
use crate::paths;
use crate::roots::RootTracker;
use crate::Result;

/// Default capacity of the work queue.
pub const DEFAULT_QUEUE_LEN: usize = 4096;

/// Upper bound on the default worker count.
const DEFAULT_MAX_WORKERS: usize = 4;

/// Events buffered per subscriber before it starts lagging.
const EVENT_CAPACITY: usize = 1024;

/// Coordinator settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Worker threads. At least one is always started.
    pub workers: usize,
    /// Capacity of the bounded work queue. Treated as at least one.
    pub queue_len: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        let workers = std::thread::available_parallelism()
            .map_or(DEFAULT_MAX_WORKERS, |n| n.get().min(DEFAULT_MAX_WORKERS));
        Self {
            workers,
            queue_len: DEFAULT_QUEUE_LEN,
        }
    }
}

struct Control {
    table: WorkTable,
    /// `None` once shutdown has started.
    queue_tx: Option<Sender<PathBuf>>,
}

struct Shared {
    reindex: Arc<dyn Reindex>,
    roots: RootTracker,
    /// Locked before `roots` whenever both are needed.
    control: Mutex<Control>,
    events: broadcast::Sender<IndexEvent>,
    closed: CancellationToken,
    stats: CoordinatorStats,
}

/// Schedules re-index work for dirty paths under roots of interest.
///
/// At most one re-index runs per path at any time. Dirty signals that arrive
/// while a path is queued are absorbed; signals that arrive while it runs
/// collapse into a single follow-up run. Work is attributed to an owner label
/// so a departing owner can drop what it queued.
pub struct IndexCoordinator {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl IndexCoordinator {
    /// Start the worker pool.
    ///
    /// # Errors
    ///
    /// Returns an error if a worker thread cannot be spawned.
    pub fn new(config: &CoordinatorConfig, reindex: impl Reindex) -> Result<Self> {
        let num_workers = config.workers.max(1);
        let queue_len = config.queue_len.max(1);
        let (queue_tx, queue_rx) = bounded(queue_len);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let shared = Arc::new(Shared {
            reindex: Arc::new(reindex),
            roots: RootTracker::new(),
            control: Mutex::new(Control {
                table: WorkTable::default(),
                queue_tx: Some(queue_tx),
            }),
            events,
            closed: CancellationToken::new(),
            stats: CoordinatorStats::default(),
        });

        let mut workers = Vec::with_capacity(num_workers);
        for i in 0..num_workers {
            let worker_shared = Arc::clone(&shared);
            let rx = queue_rx.clone();

            let spawned = std::thread::Builder::new()
                .name(format!("index-worker-{i}"))
                .spawn(move || worker_loop(&worker_shared, &rx));

            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    shared.control.lock().queue_tx = None;
                    for handle in workers {
                        let _ = handle.join();
                    }
                    return Err(
                        IndexError::WorkerPool(format!("failed to spawn worker: {e}")).into(),
                    );
                }
            }
        }

        tracing::info!(workers = num_workers, queue_len, "Index worker pool started");

        Ok(Self {
            shared,
            workers: Mutex::new(workers),
        })
    }

    /// Register interest in `root`. Returns the root's new interest count.
    pub fn acquire(&self, root: impl AsRef<Path>) -> usize {
        let Some(root) = normalize(root.as_ref()) else {
            tracing::debug!(root = %root.as_ref().display(), "Ignoring relative root");
            return 0;
        };
        let interest = self.shared.roots.acquire(&root);
        tracing::debug!(root = %root.display(), interest, "Acquired root");
        interest
    }

    /// Drop one unit of interest in `root`. Returns the remaining count.
    pub fn release(&self, root: impl AsRef<Path>) -> usize {
        let Some(root) = normalize(root.as_ref()) else {
            return 0;
        };
        let interest = self.shared.roots.release(&root);
        tracing::debug!(root = %root.display(), interest, "Released root");
        interest
    }

    /// Signal that `path` changed, without an owner.
    pub fn mark_dirty(&self, path: impl AsRef<Path>) {
        self.mark_dirty_owned("", path);
    }

    /// Signal that `path` changed on behalf of `owner`.
    ///
    /// Ignored when nothing is interested in the path, when another owner
    /// holds pending work for it, or once the coordinator is closing. May
    /// block briefly while the work queue is full.
    pub fn mark_dirty_owned(&self, owner: &str, path: impl AsRef<Path>) {
        let stats = &self.shared.stats;
        let Some(path) = normalize(path.as_ref()) else {
            CoordinatorStats::bump(&stats.ignored);
            return;
        };

        let tx = {
            let mut control = self.shared.control.lock();
            let Some(tx) = control.queue_tx.clone() else {
                CoordinatorStats::bump(&stats.ignored);
                return;
            };
            if self.shared.roots.interest_in(&path) == 0 {
                CoordinatorStats::bump(&stats.ignored);
                return;
            }

            match control.table.mark(owner, &path) {
                MarkOutcome::Enqueue => tx,
                MarkOutcome::AlreadyQueued | MarkOutcome::RerunRequested => {
                    CoordinatorStats::bump(&stats.coalesced);
                    return;
                }
                MarkOutcome::OwnerConflict => {
                    CoordinatorStats::bump(&stats.conflicts);
                    tracing::debug!(path = %path.display(), owner, "Path held by another owner");
                    return;
                }
            }
        };

        if let Err(e) = tx.send(path) {
            let path = e.into_inner();
            self.shared.control.lock().table.unqueue(&path);
            tracing::warn!(path = %path.display(), "Work queue disconnected");
            return;
        }
        CoordinatorStats::bump(&stats.queued);
    }

    /// Drop queued work of `owner` and cancel reruns of its running work.
    ///
    /// In-flight runs finish normally. Returns the number of queued entries
    /// dropped.
    pub fn drop_owner(&self, owner: &str) -> usize {
        let dropped = self.shared.control.lock().table.drop_owner(owner);
        self.shared
            .stats
            .dropped
            .fetch_add(dropped as u64, Ordering::Relaxed);
        if dropped > 0 {
            tracing::debug!(owner, dropped, "Dropped pending work");
        }
        dropped
    }

    /// Subscribe to every identifier produced from now on.
    ///
    /// The stream ends when `token` is cancelled or the coordinator closes.
    #[must_use]
    pub fn subscribe(&self, token: CancellationToken) -> Subscription {
        Subscription::new(
            self.shared.events.subscribe(),
            token,
            self.shared.closed.clone(),
            None,
        )
    }

    /// Subscribe to identifiers produced for paths equal to or below `root`.
    #[must_use]
    pub fn subscribe_under(&self, root: &Path, token: CancellationToken) -> Subscription {
        Subscription::new(
            self.shared.events.subscribe(),
            token,
            self.shared.closed.clone(),
            Some(root),
        )
    }

    /// Stop accepting work and wait for the workers to drain what was
    /// accepted, pending reruns included. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if a worker thread panicked.
    pub fn close(&self) -> Result<()> {
        let sender = self.shared.control.lock().queue_tx.take();
        let initiated = sender.is_some();
        drop(sender);

        let mut panicked = 0usize;
        {
            let mut workers = self.workers.lock();
            for handle in workers.drain(..) {
                if handle.join().is_err() {
                    panicked += 1;
                }
            }
        }
        self.shared.closed.cancel();

        if initiated {
            tracing::info!("Index coordinator closed");
        }
        if panicked > 0 {
            return Err(IndexError::WorkerPool(format!("{panicked} worker(s) panicked")).into());
        }
        Ok(())
    }

    /// Current work state of `path`, if it has pending or in-flight work.
    #[must_use]
    pub fn work_state(&self, path: impl AsRef<Path>) -> Option<PathWorkState> {
        let path = normalize(path.as_ref())?;
        self.shared.control.lock().table.get(&path).cloned()
    }

    /// Number of paths with pending or in-flight work.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.shared.control.lock().table.len()
    }

    /// Number of paths equal to or below `root` that still have work although
    /// no registered root covers them.
    ///
    /// Such work can no longer be marked again, so this only counts down as
    /// in-flight runs finish.
    #[must_use]
    pub fn orphaned_work_under(&self, root: impl AsRef<Path>) -> usize {
        let Some(root) = normalize(root.as_ref()) else {
            return 0;
        };
        let control = self.shared.control.lock();
        control
            .table
            .paths_within(&root)
            .filter(|path| self.shared.roots.interest_in(path) == 0)
            .count()
    }

    /// Total interest in `path` across registered roots containing it.
    #[must_use]
    pub fn interest(&self, path: impl AsRef<Path>) -> usize {
        normalize(path.as_ref()).map_or(0, |path| self.shared.roots.interest_in(&path))
    }

    /// The root tracker backing interest checks.
    #[must_use]
    pub fn roots(&self) -> &RootTracker {
        &self.shared.roots
    }

    /// Coordinator counters.
    #[must_use]
    pub fn stats(&self) -> CoordinatorStatsSnapshot {
        self.shared.stats.snapshot()
    }
}

impl Drop for IndexCoordinator {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(error = %e, "Index coordinator shutdown failed");
        }
    }
}

fn normalize(path: &Path) -> Option<PathBuf> {
    path.is_absolute().then(|| paths::clean(path))
}

fn worker_loop(shared: &Shared, rx: &Receiver<PathBuf>) {
    while let Ok(path) = rx.recv() {
        let mut next = Some(path);
        while let Some(path) = next {
            next = shared.process(path);
        }
    }
    tracing::debug!("Index worker shutting down");
}

impl Shared {
    /// Claim and re-index one queue item.
    ///
    /// Returns the path again when a rerun could not be requeued and must run
    /// on this worker.
    fn process(&self, path: PathBuf) -> Option<PathBuf> {
        let owner = {
            let mut control = self.control.lock();
            let has_interest = self.roots.interest_in(&path) > 0;
            match control.table.claim(&path, has_interest) {
                Claim::Run(owner) => owner,
                Claim::Discarded => {
                    CoordinatorStats::bump(&self.stats.dropped);
                    return None;
                }
                Claim::Stale => return None,
            }
        };

        CoordinatorStats::bump(&self.stats.runs);
        match self.reindex.reindex(&path) {
            Ok(Some(id)) => self.publish(&path, id),
            Ok(None) => {}
            Err(e) => {
                CoordinatorStats::bump(&self.stats.failures);
                tracing::warn!(path = %path.display(), owner, error = %e, "Re-index failed");
            }
        }

        let mut control = self.control.lock();
        let has_interest = self.roots.interest_in(&path) > 0;
        match control.table.complete(&path, has_interest) {
            CompleteOutcome::Done => None,
            CompleteOutcome::Requeue => {
                let Some(tx) = control.queue_tx.as_ref() else {
                    return Some(path);
                };
                tx.try_send(path).err().map(|e| e.into_inner())
            }
        }
    }

    fn publish(&self, path: &Path, id: ObjectId) {
        CoordinatorStats::bump(&self.stats.published);
        let _ = self.events.send(IndexEvent {
            path: path.to_path_buf(),
            id,
        });
    }
}
