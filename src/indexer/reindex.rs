//! Re-index routine: bring one path's index record up to date.

use std::fs::File;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;

use super::limiter::RateLimiter;
use crate::error::IndexError;
use crate::object::ObjectId;
use crate::storage::{IndexEntry, PathStore};
use crate::Result;

/// Routine invoked by coordinator workers for each claimed path.
///
/// Called concurrently for different paths, never for the same path at once.
/// Returns the identifier to publish, or `None` when there is nothing new to
/// report (the path vanished, or its content was already indexed).
pub trait Reindex: Send + Sync + 'static {
    /// Re-index `path`.
    ///
    /// # Errors
    ///
    /// Any error is logged by the caller and otherwise ignored.
    fn reindex(&self, path: &Path) -> Result<Option<ObjectId>>;
}

impl<F> Reindex for F
where
    F: Fn(&Path) -> Result<Option<ObjectId>> + Send + Sync + 'static,
{
    fn reindex(&self, path: &Path) -> Result<Option<ObjectId>> {
        self(path)
    }
}

/// Compute the identifier of a file's current content.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub fn resolve_file_id(path: &Path) -> Result<ObjectId> {
    let file = File::open(path).map_err(|e| IndexError::resolve(path, e))?;
    ObjectId::of_reader(file).map_err(|e| IndexError::resolve(path, e).into())
}

/// Default re-index routine backed by a [`PathStore`].
///
/// - path missing: its record and every record below it are deleted, which
///   covers directories renamed or removed as a whole
/// - path not a regular file: its record is deleted
/// - modification time and size unchanged since the last hash: nothing to do
/// - otherwise the file is hashed and its record replaced
///
/// Stat and hash calls can be paced with [`RateLimiter`]s shared by all
/// workers.
#[derive(Debug, Clone)]
pub struct FileReindexer<S> {
    store: S,
    stat_limiter: Option<Arc<RateLimiter>>,
    hash_limiter: Option<Arc<RateLimiter>>,
}

impl<S: PathStore> FileReindexer<S> {
    /// Create an unpaced re-indexer writing to `store`.
    #[must_use]
    pub const fn new(store: S) -> Self {
        Self {
            store,
            stat_limiter: None,
            hash_limiter: None,
        }
    }

    /// Pace stat calls with `limiter`.
    #[must_use]
    pub fn with_stat_limiter(mut self, limiter: Option<RateLimiter>) -> Self {
        self.stat_limiter = limiter.map(Arc::new);
        self
    }

    /// Pace file hashing with `limiter`.
    #[must_use]
    pub fn with_hash_limiter(mut self, limiter: Option<RateLimiter>) -> Self {
        self.hash_limiter = limiter.map(Arc::new);
        self
    }

    /// The underlying store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    fn forget(&self, path: &Path) -> Result<Option<ObjectId>> {
        if self.store.delete(path)? {
            tracing::info!(path = %path.display(), "Removed path from index");
        }
        Ok(None)
    }

    fn forget_tree(&self, path: &Path) -> Result<Option<ObjectId>> {
        let removed = self.store.delete_under(path)?;
        if removed > 0 {
            tracing::info!(path = %path.display(), removed, "Removed missing path from index");
        }
        Ok(None)
    }
}

fn pace(limiter: Option<&Arc<RateLimiter>>) {
    if let Some(limiter) = limiter {
        limiter.wait();
    }
}

impl<S: PathStore> Reindex for FileReindexer<S> {
    fn reindex(&self, path: &Path) -> Result<Option<ObjectId>> {
        pace(self.stat_limiter.as_ref());
        let metadata = match std::fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => return self.forget_tree(path),
            Err(e) => return Err(e.into()),
        };

        if !metadata.is_file() {
            return self.forget(path);
        }

        let mod_time = metadata.modified()?;
        if let Some(entry) = self.store.find(path)? {
            if entry.mod_time == mod_time && entry.id.size() == metadata.len() {
                tracing::debug!(path = %path.display(), "File unchanged, skipping");
                return Ok(None);
            }
        }

        pace(self.hash_limiter.as_ref());
        let id = resolve_file_id(path)?;
        self.store.upsert(path, IndexEntry { id, mod_time })?;

        tracing::info!(path = %path.display(), object = %id, size = id.size(), "Indexed file");
        Ok(Some(id))
    }
}
