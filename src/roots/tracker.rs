//! Thread-safe root interest tracking.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use super::tree::RootTree;

/// Shared registry of roots of interest.
///
/// Wraps a [`RootTree`] behind a single mutex. Callers register roots with
/// [`acquire`](Self::acquire) and drop them with [`release`](Self::release);
/// the last release removes the root and promotes its descendants.
#[derive(Debug, Default)]
pub struct RootTracker {
    tree: Mutex<RootTree>,
}

impl RootTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `root` if needed and bump its interest. Returns the new count.
    pub fn acquire(&self, root: &Path) -> usize {
        let mut tree = self.tree.lock();
        tree.add(root);
        let interest = tree.interest(root) + 1;
        tree.set_interest(root, interest);
        interest
    }

    /// Drop one unit of interest in `root`, removing it at zero.
    ///
    /// Returns the remaining interest. Releasing an unknown root is a no-op.
    pub fn release(&self, root: &Path) -> usize {
        let mut tree = self.tree.lock();
        if !tree.has(root) {
            return 0;
        }

        let interest = tree.interest(root).saturating_sub(1);
        if interest == 0 {
            tree.remove(root);
        } else {
            tree.set_interest(root, interest);
        }
        interest
    }

    /// Register a root without changing interest.
    pub fn add(&self, root: &Path) {
        self.tree.lock().add(root);
    }

    /// Unregister a root regardless of its interest.
    pub fn remove(&self, root: &Path) -> bool {
        self.tree.lock().remove(root)
    }

    /// Check whether `root` is registered.
    #[must_use]
    pub fn has(&self, root: &Path) -> bool {
        self.tree.lock().has(root)
    }

    /// The widest registered root strictly containing `path`.
    #[must_use]
    pub fn find_widest(&self, path: &Path) -> Option<PathBuf> {
        self.tree.lock().find_widest(path)
    }

    /// All registered roots strictly containing `path`, widest first.
    #[must_use]
    pub fn find_all(&self, path: &Path) -> Vec<PathBuf> {
        self.tree.lock().find_all(path)
    }

    /// Roots without a parent, sorted.
    #[must_use]
    pub fn top_level(&self) -> Vec<PathBuf> {
        self.tree.lock().top_level()
    }

    /// Immediate children of `root`, sorted.
    #[must_use]
    pub fn children(&self, root: &Path) -> Vec<PathBuf> {
        self.tree.lock().children(root)
    }

    /// Parent root of `root`, if any.
    #[must_use]
    pub fn parent(&self, root: &Path) -> Option<PathBuf> {
        self.tree.lock().parent(root)
    }

    /// Number of registered roots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.lock().len()
    }

    /// Check whether no roots are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.lock().is_empty()
    }

    /// All registered roots, sorted.
    #[must_use]
    pub fn all(&self) -> Vec<PathBuf> {
        self.tree.lock().all()
    }

    /// Overwrite the interest count of a registered root.
    pub fn set_interest(&self, root: &Path, interest: usize) {
        self.tree.lock().set_interest(root, interest);
    }

    /// Interest count of `root` alone.
    #[must_use]
    pub fn interest(&self, root: &Path) -> usize {
        self.tree.lock().interest(root)
    }

    /// Interest of `root` and every descendant root.
    #[must_use]
    pub fn aggregated_interest(&self, root: &Path) -> usize {
        self.tree.lock().aggregated_interest(root)
    }

    /// Interest covering `path`: the sum over every root equal to or
    /// containing it.
    #[must_use]
    pub fn interest_in(&self, path: &Path) -> usize {
        self.tree.lock().interest_in(path)
    }
}
