//! Path to object identifier storage.
//!
//! The coordinator never talks to storage directly; the re-index routine
//! does. This module provides the store interface and an in-memory
//! implementation used by the runner and the tests.

mod memory;

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::object::ObjectId;
use crate::Result;

pub use memory::MemoryStore;

/// Indexed state of one path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    /// Identifier of the content at the time of indexing.
    pub id: ObjectId,
    /// Modification time observed when the content was hashed.
    pub mod_time: SystemTime,
}

/// Persistent mapping from absolute path to object identifier.
///
/// Implementations must be safe to call from several worker threads at once.
pub trait PathStore: Send + Sync + 'static {
    /// Look up the entry for `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be queried.
    fn find(&self, path: &Path) -> Result<Option<IndexEntry>>;

    /// Insert or replace the entry for `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn upsert(&self, path: &Path, entry: IndexEntry) -> Result<()>;

    /// Delete the entry for `path`. Returns whether one existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn delete(&self, path: &Path) -> Result<bool>;

    /// Delete the entries for `root` and every path below it. Returns how
    /// many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn delete_under(&self, root: &Path) -> Result<usize>;

    /// Entries for `root` and every path below it.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be queried.
    fn entries_under(&self, root: &Path) -> Result<Vec<(PathBuf, IndexEntry)>>;

    /// Check whether any path equal to or below `root` maps to `id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be queried.
    fn contains_object(&self, root: &Path, id: &ObjectId) -> Result<bool> {
        Ok(self
            .entries_under(root)?
            .iter()
            .any(|(_, entry)| entry.id == *id))
    }
}
