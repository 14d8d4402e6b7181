//! Replay of a repository's indexed identifiers, optionally followed by
//! live updates.

use std::collections::HashSet;
use std::path::Path;

use tokio_util::sync::CancellationToken;

use crate::indexer::Subscription;
use crate::object::ObjectId;
use crate::storage::PathStore;
use crate::Result;

/// Stream returned by [`WatchRepository::scan`](super::WatchRepository::scan).
///
/// Yields every distinct identifier indexed under the root at the time of
/// the call, then, when following, identifiers produced for the root from
/// then on. A live identifier may repeat one already replayed.
#[derive(Debug)]
pub struct RepositoryScan {
    replay: std::vec::IntoIter<ObjectId>,
    live: Option<Subscription>,
    token: CancellationToken,
}

impl RepositoryScan {
    /// `live` must be subscribed before the store is read so that nothing
    /// indexed in between is lost.
    pub(crate) fn new(
        store: &dyn PathStore,
        root: &Path,
        live: Option<Subscription>,
        token: CancellationToken,
    ) -> Result<Self> {
        let mut seen = HashSet::new();
        let ids: Vec<ObjectId> = store
            .entries_under(root)?
            .into_iter()
            .map(|(_, entry)| entry.id)
            .filter(|id| seen.insert(*id))
            .collect();

        Ok(Self {
            replay: ids.into_iter(),
            live,
            token,
        })
    }

    /// Next identifier. `None` once the replay is exhausted and the scan
    /// does not follow, or once the token is cancelled.
    pub async fn recv(&mut self) -> Option<ObjectId> {
        if self.token.is_cancelled() {
            return None;
        }
        if let Some(id) = self.replay.next() {
            return Some(id);
        }
        self.live.as_mut()?.recv().await
    }
}
