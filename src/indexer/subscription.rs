//! Streams of freshly indexed objects.

use std::path::{Path, PathBuf};

use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;

use crate::object::ObjectId;
use crate::paths;

/// A path whose re-index produced an identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexEvent {
    /// Re-indexed path.
    pub path: PathBuf,
    /// Identifier of its content.
    pub id: ObjectId,
}

/// Independent stream of index events.
///
/// Delivery is best-effort: a subscriber that falls behind skips the events
/// it missed rather than slowing the workers down. The stream ends when its
/// token is cancelled or the coordinator is closed.
#[derive(Debug)]
pub struct Subscription {
    rx: broadcast::Receiver<IndexEvent>,
    cancel: CancellationToken,
    closed: CancellationToken,
    filter: Option<PathBuf>,
}

impl Subscription {
    pub(crate) fn new(
        rx: broadcast::Receiver<IndexEvent>,
        cancel: CancellationToken,
        closed: CancellationToken,
        filter: Option<&Path>,
    ) -> Self {
        Self {
            rx,
            cancel,
            closed,
            filter: filter.map(paths::clean),
        }
    }

    /// Wait for the next identifier. `None` once the stream has ended.
    pub async fn recv(&mut self) -> Option<ObjectId> {
        self.recv_event().await.map(|event| event.id)
    }

    /// Wait for the next event, including its path.
    pub async fn recv_event(&mut self) -> Option<IndexEvent> {
        loop {
            let received = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return None,
                received = self.rx.recv() => received,
                () = self.closed.cancelled() => return None,
            };

            match received {
                Ok(event) => {
                    if self.accepts(&event.path) {
                        return Some(event);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Index subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    fn accepts(&self, path: &Path) -> bool {
        self.filter
            .as_deref()
            .map_or(true, |root| paths::is_within(root, path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(path: &str, content: &[u8]) -> IndexEvent {
        IndexEvent {
            path: PathBuf::from(path),
            id: ObjectId::of_bytes(content),
        }
    }

    #[tokio::test]
    async fn test_filter_by_root() {
        let (tx, rx) = broadcast::channel(16);
        let mut sub = Subscription::new(
            rx,
            CancellationToken::new(),
            CancellationToken::new(),
            Some(Path::new("/work")),
        );

        tx.send(event("/workshop/a", b"a")).unwrap();
        tx.send(event("/work/b", b"b")).unwrap();

        assert_eq!(sub.recv().await, Some(ObjectId::of_bytes(b"b")));
    }

    #[tokio::test]
    async fn test_cancel_ends_stream() {
        let (_tx, rx) = broadcast::channel::<IndexEvent>(16);
        let cancel = CancellationToken::new();
        let mut sub = Subscription::new(rx, cancel.clone(), CancellationToken::new(), None);

        cancel.cancel();
        assert_eq!(sub.recv().await, None);
    }

    #[tokio::test]
    async fn test_close_drains_buffered_events_first() {
        let (tx, rx) = broadcast::channel(16);
        let closed = CancellationToken::new();
        let mut sub = Subscription::new(rx, CancellationToken::new(), closed.clone(), None);

        tx.send(event("/a", b"a")).unwrap();
        closed.cancel();

        assert_eq!(sub.recv().await, Some(ObjectId::of_bytes(b"a")));
        assert_eq!(sub.recv().await, None);
    }

    #[tokio::test]
    async fn test_lagging_subscriber_skips() {
        let (tx, rx) = broadcast::channel(2);
        let mut sub = Subscription::new(rx, CancellationToken::new(), CancellationToken::new(), None);

        for i in 0..5u8 {
            tx.send(event("/a", &[i])).unwrap();
        }

        assert_eq!(sub.recv().await, Some(ObjectId::of_bytes(&[3])));
        assert_eq!(sub.recv().await, Some(ObjectId::of_bytes(&[4])));
    }
}
