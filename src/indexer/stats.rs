//! Coordinator counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics for the indexing coordinator.
#[derive(Debug, Default)]
pub struct CoordinatorStats {
    /// Dirty signals that moved a path into the queue.
    pub queued: AtomicU64,
    /// Dirty signals ignored for lack of interest or an invalid path.
    pub ignored: AtomicU64,
    /// Dirty signals folded into existing queued or running work.
    pub coalesced: AtomicU64,
    /// Dirty signals rejected because another owner holds the path.
    pub conflicts: AtomicU64,
    /// Re-index invocations.
    pub runs: AtomicU64,
    /// Re-index invocations that failed.
    pub failures: AtomicU64,
    /// Identifiers published to subscribers.
    pub published: AtomicU64,
    /// Queued entries discarded before running (owner dropped, interest gone).
    pub dropped: AtomicU64,
}

impl CoordinatorStats {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of current stats.
    #[must_use]
    pub fn snapshot(&self) -> CoordinatorStatsSnapshot {
        CoordinatorStatsSnapshot {
            queued: self.queued.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            conflicts: self.conflicts.load(Ordering::Relaxed),
            runs: self.runs.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of coordinator stats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoordinatorStatsSnapshot {
    pub queued: u64,
    pub ignored: u64,
    pub coalesced: u64,
    pub conflicts: u64,
    pub runs: u64,
    pub failures: u64,
    pub published: u64,
    pub dropped: u64,
}
