//! Per-path work bookkeeping.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::paths;

/// Indexing state of one path with pending or in-flight work.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathWorkState {
    /// Label the pending work is attributed to. Empty for unowned work.
    pub owner: String,
    /// Waiting in the work queue.
    pub queued: bool,
    /// A worker is re-indexing the path right now.
    pub running: bool,
    /// A dirty signal arrived mid-run; run once more afterwards.
    /// Only ever set while `running`.
    pub rerun_requested: bool,
}

/// Coarse phase of a path's work state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkPhase {
    /// Waiting for a worker.
    Queued,
    /// Being re-indexed.
    Running,
    /// Being re-indexed, with one more pass requested.
    RunningWithRerun,
}

impl PathWorkState {
    fn owned_by(owner: &str) -> Self {
        Self {
            owner: owner.to_string(),
            ..Self::default()
        }
    }

    /// Phase of this state. `None` for an idle state, which is never stored.
    #[must_use]
    pub const fn phase(&self) -> Option<WorkPhase> {
        match (self.queued, self.running, self.rerun_requested) {
            (_, true, true) => Some(WorkPhase::RunningWithRerun),
            (_, true, false) => Some(WorkPhase::Running),
            (true, false, _) => Some(WorkPhase::Queued),
            (false, false, _) => None,
        }
    }
}

/// Outcome of a dirty signal against the work table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MarkOutcome {
    /// The path went from absent to queued; the caller must push it.
    Enqueue,
    /// The path was already queued.
    AlreadyQueued,
    /// The path is running; a rerun was recorded.
    RerunRequested,
    /// The path is owned by someone else.
    OwnerConflict,
}

/// Outcome of a worker trying to claim a queue item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Claim {
    /// The path is now running on behalf of this owner.
    Run(String),
    /// The path was queued but nobody is interested any more; its entry is gone.
    Discarded,
    /// Stale queue item: the path is absent, not queued, or already running.
    Stale,
}

/// Outcome of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CompleteOutcome {
    /// The path is back in the queued state; the caller must push it.
    Requeue,
    /// The state entry was removed.
    Done,
}

/// Work state of every path with pending or in-flight work.
///
/// Not synchronized; the coordinator keeps it behind its mutex.
#[derive(Debug, Default)]
pub(crate) struct WorkTable {
    states: HashMap<PathBuf, PathWorkState>,
}

impl WorkTable {
    /// Apply a dirty signal for `path` on behalf of `owner`.
    pub(crate) fn mark(&mut self, owner: &str, path: &Path) -> MarkOutcome {
        let state = self
            .states
            .entry(path.to_path_buf())
            .or_insert_with(|| PathWorkState::owned_by(owner));

        if state.owner != owner {
            return MarkOutcome::OwnerConflict;
        }
        if state.running {
            state.rerun_requested = true;
            return MarkOutcome::RerunRequested;
        }
        if state.queued {
            return MarkOutcome::AlreadyQueued;
        }
        state.queued = true;
        MarkOutcome::Enqueue
    }

    /// Undo a mark whose queue push failed.
    pub(crate) fn unqueue(&mut self, path: &Path) {
        if let Some(state) = self.states.get(path) {
            if state.queued && !state.running {
                self.states.remove(path);
            }
        }
    }

    /// Try to move `path` from queued to running.
    ///
    /// With `has_interest == false` a queued entry is dropped instead of
    /// claimed.
    pub(crate) fn claim(&mut self, path: &Path, has_interest: bool) -> Claim {
        let Some(state) = self.states.get_mut(path) else {
            return Claim::Stale;
        };
        if !state.queued || state.running {
            return Claim::Stale;
        }
        if !has_interest {
            self.states.remove(path);
            return Claim::Discarded;
        }
        state.queued = false;
        state.running = true;
        Claim::Run(state.owner.clone())
    }

    /// Finish the run of `path`.
    ///
    /// The path is requeued only if a rerun was requested and interest
    /// remains; otherwise its entry is removed.
    pub(crate) fn complete(&mut self, path: &Path, has_interest: bool) -> CompleteOutcome {
        let Some(state) = self.states.get_mut(path) else {
            return CompleteOutcome::Done;
        };
        state.running = false;

        if state.rerun_requested && has_interest {
            state.rerun_requested = false;
            state.queued = true;
            return CompleteOutcome::Requeue;
        }

        self.states.remove(path);
        CompleteOutcome::Done
    }

    /// Drop queued work of `owner` and cancel reruns of its running work.
    ///
    /// Returns the number of queued entries removed.
    pub(crate) fn drop_owner(&mut self, owner: &str) -> usize {
        let before = self.states.len();
        self.states.retain(|_, state| {
            if state.owner != owner {
                return true;
            }
            if state.running {
                state.rerun_requested = false;
                return true;
            }
            !state.queued
        });
        before - self.states.len()
    }

    pub(crate) fn get(&self, path: &Path) -> Option<&PathWorkState> {
        self.states.get(path)
    }

    pub(crate) fn len(&self) -> usize {
        self.states.len()
    }

    /// Paths with work equal to or below `root`.
    pub(crate) fn paths_within<'a>(&'a self, root: &'a Path) -> impl Iterator<Item = &'a Path> {
        self.states
            .keys()
            .map(PathBuf::as_path)
            .filter(move |path| paths::is_within(root, path))
    }
}
