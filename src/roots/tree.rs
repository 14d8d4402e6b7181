//! Forest of registered roots.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use crate::paths;

/// A registered root in the forest.
#[derive(Debug, Clone, Default)]
struct RootNode {
    /// Reference count for this specific root.
    interest: usize,
    /// Closest registered ancestor, if any.
    parent: Option<PathBuf>,
    /// Roots whose closest registered ancestor is this root.
    children: BTreeSet<PathBuf>,
}

/// Hierarchy of root paths.
///
/// Nodes live in an arena keyed by cleaned path; parent and child links are
/// keys into that arena. Adding a root that covers existing roots adopts them,
/// removing a root promotes its children to its former parent.
///
/// Not synchronized. See [`RootTracker`](super::RootTracker) for the shared
/// version.
#[derive(Debug, Default)]
pub struct RootTree {
    nodes: HashMap<PathBuf, RootNode>,
}

impl RootTree {
    /// Create an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a root and restructure the hierarchy. Idempotent.
    pub fn add(&mut self, root: &Path) {
        let root = paths::clean(root);
        if self.nodes.contains_key(&root) {
            return;
        }

        let parent = self.closest_ancestor(&root);

        // Everything that will move under the new root currently hangs off
        // the new root's parent (or the top level).
        let siblings: Vec<PathBuf> = match &parent {
            Some(parent) => self.nodes[parent].children.iter().cloned().collect(),
            None => self
                .nodes
                .iter()
                .filter(|(_, node)| node.parent.is_none())
                .map(|(path, _)| path.clone())
                .collect(),
        };
        let adopted: BTreeSet<PathBuf> = siblings
            .into_iter()
            .filter(|candidate| paths::contains(&root, candidate))
            .collect();

        for child in &adopted {
            if let Some(parent) = &parent {
                if let Some(parent_node) = self.nodes.get_mut(parent) {
                    parent_node.children.remove(child);
                }
            }
            if let Some(child_node) = self.nodes.get_mut(child) {
                child_node.parent = Some(root.clone());
            }
        }

        if let Some(parent) = &parent {
            if let Some(parent_node) = self.nodes.get_mut(parent) {
                parent_node.children.insert(root.clone());
            }
        }

        self.nodes.insert(
            root,
            RootNode {
                interest: 0,
                parent,
                children: adopted,
            },
        );
    }

    /// Unregister a root. Its children are promoted to its parent level.
    ///
    /// Returns `false` if the root was not registered.
    pub fn remove(&mut self, root: &Path) -> bool {
        let root = paths::clean(root);
        let Some(node) = self.nodes.remove(&root) else {
            return false;
        };

        for child in &node.children {
            if let Some(child_node) = self.nodes.get_mut(child) {
                child_node.parent.clone_from(&node.parent);
            }
        }

        if let Some(parent) = &node.parent {
            if let Some(parent_node) = self.nodes.get_mut(parent) {
                parent_node.children.remove(&root);
                parent_node.children.extend(node.children.iter().cloned());
            }
        }

        true
    }

    /// Check whether `root` is registered.
    #[must_use]
    pub fn has(&self, root: &Path) -> bool {
        self.nodes.contains_key(&paths::clean(root))
    }

    /// The widest (most ancestral) registered root strictly containing `path`.
    #[must_use]
    pub fn find_widest(&self, path: &Path) -> Option<PathBuf> {
        self.find_all(path).into_iter().next()
    }

    /// All registered roots strictly containing `path`, widest first.
    #[must_use]
    pub fn find_all(&self, path: &Path) -> Vec<PathBuf> {
        let path = paths::clean(path);
        let mut found: Vec<PathBuf> = path
            .ancestors()
            .skip(1)
            .filter(|ancestor| self.nodes.contains_key(*ancestor))
            .map(Path::to_path_buf)
            .collect();
        found.reverse();
        found
    }

    /// All roots with no parent, sorted.
    #[must_use]
    pub fn top_level(&self) -> Vec<PathBuf> {
        let mut result: Vec<PathBuf> = self
            .nodes
            .iter()
            .filter(|(_, node)| node.parent.is_none())
            .map(|(path, _)| path.clone())
            .collect();
        result.sort();
        result
    }

    /// Immediate child roots of `root`, sorted.
    #[must_use]
    pub fn children(&self, root: &Path) -> Vec<PathBuf> {
        self.nodes
            .get(&paths::clean(root))
            .map(|node| node.children.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Parent root of `root`, if any.
    #[must_use]
    pub fn parent(&self, root: &Path) -> Option<PathBuf> {
        self.nodes
            .get(&paths::clean(root))
            .and_then(|node| node.parent.clone())
    }

    /// Number of registered roots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check whether no roots are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All registered roots, sorted.
    #[must_use]
    pub fn all(&self) -> Vec<PathBuf> {
        let mut result: Vec<PathBuf> = self.nodes.keys().cloned().collect();
        result.sort();
        result
    }

    /// Set the interest count of a registered root. No-op for unknown roots.
    pub fn set_interest(&mut self, root: &Path, interest: usize) {
        if let Some(node) = self.nodes.get_mut(&paths::clean(root)) {
            node.interest = interest;
        }
    }

    /// Interest count of a root, 0 if unknown.
    #[must_use]
    pub fn interest(&self, root: &Path) -> usize {
        self.nodes
            .get(&paths::clean(root))
            .map_or(0, |node| node.interest)
    }

    /// Interest of `root` plus that of all of its descendants.
    #[must_use]
    pub fn aggregated_interest(&self, root: &Path) -> usize {
        let mut total = 0;
        let mut stack = vec![paths::clean(root)];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.get(&current) {
                total += node.interest;
                stack.extend(node.children.iter().cloned());
            }
        }
        total
    }

    /// Total interest of all roots equal to or containing `path`.
    #[must_use]
    pub fn interest_in(&self, path: &Path) -> usize {
        paths::clean(path)
            .ancestors()
            .filter_map(|ancestor| self.nodes.get(ancestor))
            .map(|node| node.interest)
            .sum()
    }

    fn closest_ancestor(&self, root: &Path) -> Option<PathBuf> {
        root.ancestors()
            .skip(1)
            .find(|ancestor| self.nodes.contains_key(*ancestor))
            .map(Path::to_path_buf)
    }
}
