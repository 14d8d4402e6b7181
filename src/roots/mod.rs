//! Roots of interest.
//!
//! This module provides:
//! - `RootTree`, a forest of registered directory roots where the closest
//!   registered ancestor is always the parent
//! - `RootTracker`, the mutex-guarded, reference-counted registry used by the
//!   indexing coordinator

mod tracker;
mod tree;

pub use tracker::RootTracker;
pub use tree::RootTree;
