//! In-memory path store.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use super::{IndexEntry, PathStore};
use crate::error::IndexError;
use crate::object::ObjectId;
use crate::paths;
use crate::Result;

/// Path store kept entirely in memory.
///
/// Clone is cheap - it just clones the Arc.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<PathBuf, IndexEntry>>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of indexed paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Indexed paths equal to or below `root`, sorted.
    #[must_use]
    pub fn paths_under(&self, root: &Path) -> Vec<PathBuf> {
        let mut result: Vec<PathBuf> = self
            .entries
            .read()
            .keys()
            .filter(|path| paths::is_within(root, path))
            .cloned()
            .collect();
        result.sort();
        result
    }
}

fn require_absolute(path: &Path) -> Result<()> {
    if path.is_absolute() {
        Ok(())
    } else {
        Err(IndexError::InvalidPath(path.display().to_string()).into())
    }
}

impl PathStore for MemoryStore {
    fn find(&self, path: &Path) -> Result<Option<IndexEntry>> {
        Ok(self.entries.read().get(path).copied())
    }

    fn upsert(&self, path: &Path, entry: IndexEntry) -> Result<()> {
        require_absolute(path)?;
        self.entries.write().insert(path.to_path_buf(), entry);
        Ok(())
    }

    fn delete(&self, path: &Path) -> Result<bool> {
        Ok(self.entries.write().remove(path).is_some())
    }

    fn delete_under(&self, root: &Path) -> Result<usize> {
        require_absolute(root)?;
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|path, _| !paths::is_within(root, path));
        Ok(before - entries.len())
    }

    fn entries_under(&self, root: &Path) -> Result<Vec<(PathBuf, IndexEntry)>> {
        let mut result: Vec<(PathBuf, IndexEntry)> = self
            .entries
            .read()
            .iter()
            .filter(|(path, _)| paths::is_within(root, path))
            .map(|(path, entry)| (path.clone(), *entry))
            .collect();
        result.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(result)
    }

    fn contains_object(&self, root: &Path, id: &ObjectId) -> Result<bool> {
        Ok(self
            .entries
            .read()
            .iter()
            .any(|(path, entry)| entry.id == *id && paths::is_within(root, path)))
    }
}
