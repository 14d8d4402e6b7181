//! Watched repositories: a change watcher wired to the indexing coordinator.

#[allow(clippy::module_inception)]
mod repository;
mod replay;
mod scanner;

pub use replay::RepositoryScan;
pub use repository::WatchRepository;
pub use scanner::{scan_directory, scan_directory_async, ScanStats, ScanStatsSnapshot};
