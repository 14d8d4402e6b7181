//! Per-path write debouncing.
//!
//! Each path with pending writes owns one timer task. Further writes only push
//! the deadline forward; the task re-arms itself until the deadline stops
//! moving and then emits a single `WriteSettled`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::time::Instant;

use super::events::{WatchEvent, WatchListener};

/// Deadline of one pending write burst.
#[derive(Debug, Clone, Copy)]
struct PendingWrite {
    deadline: Instant,
    /// Distinguishes this burst's timer from timers of earlier, cancelled bursts.
    generation: u64,
}

#[derive(Debug, Default)]
struct PendingWrites {
    timers: HashMap<PathBuf, PendingWrite>,
    next_generation: u64,
}

struct DebouncerInner {
    quiet: Duration,
    pending: Mutex<PendingWrites>,
    listener: Arc<dyn WatchListener>,
    runtime: Handle,
}

/// Collapses write bursts into single settle events.
#[derive(Clone)]
pub(crate) struct WriteDebouncer {
    inner: Arc<DebouncerInner>,
}

enum Step {
    Sleep(Instant),
    Fire,
    Stop,
}

impl WriteDebouncer {
    pub(crate) fn new(quiet: Duration, listener: Arc<dyn WatchListener>, runtime: Handle) -> Self {
        Self {
            inner: Arc::new(DebouncerInner {
                quiet,
                pending: Mutex::new(PendingWrites::default()),
                listener,
                runtime,
            }),
        }
    }

    /// Record a write on `path`, scheduling or postponing its settle event.
    pub(crate) fn on_write(&self, path: PathBuf) {
        let deadline = Instant::now() + self.inner.quiet;

        let generation = {
            let mut pending = self.inner.pending.lock();
            if let Some(timer) = pending.timers.get_mut(&path) {
                timer.deadline = deadline;
                return;
            }
            pending.next_generation += 1;
            let generation = pending.next_generation;
            pending.timers.insert(
                path.clone(),
                PendingWrite {
                    deadline,
                    generation,
                },
            );
            generation
        };

        let inner = Arc::clone(&self.inner);
        self.inner
            .runtime
            .spawn(async move { inner.settle(path, generation, deadline).await });
    }

    /// Drop the pending settle event for `path`, if any.
    pub(crate) fn cancel(&self, path: &Path) -> bool {
        let cancelled = self.inner.pending.lock().timers.remove(path).is_some();
        if cancelled {
            tracing::trace!(path = %path.display(), "Pending write cancelled");
        }
        cancelled
    }

    /// Drop every pending settle event.
    pub(crate) fn cancel_all(&self) {
        self.inner.pending.lock().timers.clear();
    }

    /// Number of paths with a pending settle event.
    #[cfg(test)]
    pub(crate) fn pending(&self) -> usize {
        self.inner.pending.lock().timers.len()
    }
}

impl DebouncerInner {
    async fn settle(&self, path: PathBuf, generation: u64, first_deadline: Instant) {
        let mut deadline = first_deadline;
        loop {
            tokio::time::sleep_until(deadline).await;

            let step = {
                let mut pending = self.pending.lock();
                match pending.timers.get(&path).copied() {
                    Some(timer) if timer.generation == generation => {
                        if timer.deadline > Instant::now() {
                            Step::Sleep(timer.deadline)
                        } else {
                            pending.timers.remove(&path);
                            Step::Fire
                        }
                    }
                    _ => Step::Stop,
                }
            };

            match step {
                Step::Sleep(next) => deadline = next,
                Step::Fire => break,
                Step::Stop => return,
            }
        }

        tracing::debug!(path = %path.display(), "Write settled");
        self.listener.on_event(WatchEvent::WriteSettled(path));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watcher::events::channel_listener;
    use tokio::sync::mpsc::error::TryRecvError;

    const QUIET: Duration = Duration::from_millis(300);

    #[tokio::test(start_paused = true)]
    async fn test_burst_settles_once_after_last_write() {
        let (listener, mut rx) = channel_listener();
        let debouncer = WriteDebouncer::new(QUIET, listener, Handle::current());
        let path = PathBuf::from("/d/burst.bin");

        debouncer.on_write(path.clone());
        tokio::time::sleep(Duration::from_millis(100)).await;
        debouncer.on_write(path.clone());
        tokio::time::sleep(Duration::from_millis(100)).await;
        debouncer.on_write(path.clone());
        let last_write = Instant::now();

        let event = rx.recv().await.unwrap();
        assert!(matches!(&event, WatchEvent::WriteSettled(p) if *p == path));
        let waited = Instant::now() - last_write;
        assert!(waited >= QUIET && waited < QUIET + Duration::from_millis(50));

        tokio::time::sleep(QUIET * 3).await;
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
        assert_eq!(debouncer.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_suppresses_settle() {
        let (listener, mut rx) = channel_listener();
        let debouncer = WriteDebouncer::new(QUIET, listener, Handle::current());
        let path = PathBuf::from("/d/gone.bin");

        debouncer.on_write(path.clone());
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(debouncer.cancel(&path));

        tokio::time::sleep(QUIET * 3).await;
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_after_cancel_starts_new_burst() {
        let (listener, mut rx) = channel_listener();
        let debouncer = WriteDebouncer::new(QUIET, listener, Handle::current());
        let path = PathBuf::from("/d/again.bin");

        debouncer.on_write(path.clone());
        tokio::time::sleep(Duration::from_millis(100)).await;
        debouncer.cancel(&path);
        debouncer.on_write(path.clone());
        let rewritten = Instant::now();

        let event = rx.recv().await.unwrap();
        assert!(matches!(event, WatchEvent::WriteSettled(_)));
        let waited = Instant::now() - rewritten;
        assert!(waited >= QUIET && waited < QUIET + Duration::from_millis(50));

        tokio::time::sleep(QUIET * 3).await;
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_paths_are_independent() {
        let (listener, mut rx) = channel_listener();
        let debouncer = WriteDebouncer::new(QUIET, listener, Handle::current());

        debouncer.on_write(PathBuf::from("/d/a"));
        debouncer.on_write(PathBuf::from("/d/b"));
        assert_eq!(debouncer.pending(), 2);

        let mut settled = vec![
            rx.recv().await.unwrap().path().unwrap().to_path_buf(),
            rx.recv().await.unwrap().path().unwrap().to_path_buf(),
        ];
        settled.sort();
        assert_eq!(settled, vec![PathBuf::from("/d/a"), PathBuf::from("/d/b")]);
    }
}
