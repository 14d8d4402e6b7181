//! fsindex
//!
//! Keeps a content index of directory trees up to date as files change.
//!
//! - [`watcher`] turns OS notifications into debounced change events
//! - [`roots`] tracks which directory trees anyone is interested in
//! - [`indexer`] schedules deduplicated re-index work on a worker pool
//! - [`repository`] wires a watcher and an initial scan to the coordinator

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod indexer;
pub mod object;
pub mod observability;
pub mod paths;
pub mod repository;
pub mod roots;
pub mod storage;
pub mod watcher;

pub use config::Config;
pub use error::{Error, IndexError, Result, WatcherError};
pub use indexer::{CoordinatorConfig, FileReindexer, IndexCoordinator, Reindex, Subscription};
pub use object::ObjectId;
pub use repository::{RepositoryScan, WatchRepository};
pub use roots::RootTracker;
pub use storage::{MemoryStore, PathStore};
pub use watcher::{ChangeWatcher, WatchEvent, WatcherConfig};
