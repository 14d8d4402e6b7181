//! Directory scanner for initial indexing.
//!
//! Walks a directory tree and marks every regular file dirty.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

use crate::indexer::IndexCoordinator;
use crate::Result;

/// Scan statistics.
#[derive(Debug, Default)]
pub struct ScanStats {
    pub files_found: AtomicU64,
    pub files_queued: AtomicU64,
    pub files_skipped: AtomicU64,
    pub errors: AtomicU64,
}

impl ScanStats {
    /// Create new stats.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a snapshot of current stats.
    #[must_use]
    pub fn snapshot(&self) -> ScanStatsSnapshot {
        ScanStatsSnapshot {
            files_found: self.files_found.load(Ordering::Relaxed),
            files_queued: self.files_queued.load(Ordering::Relaxed),
            files_skipped: self.files_skipped.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of scan stats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStatsSnapshot {
    pub files_found: u64,
    pub files_queued: u64,
    pub files_skipped: u64,
    pub errors: u64,
}

/// Scan `root` and mark every regular file below it dirty on behalf of
/// `owner`.
///
/// Symlinks are not followed and count as skipped. Stops early once
/// `cancel` fires.
pub fn scan_directory(
    root: &Path,
    owner: &str,
    coordinator: &IndexCoordinator,
    cancel: &CancellationToken,
) -> ScanStatsSnapshot {
    let stats = ScanStats::new();

    tracing::info!(path = %root.display(), owner, "Starting directory scan");

    for entry in WalkDir::new(root).min_depth(1).follow_links(false) {
        if cancel.is_cancelled() {
            tracing::debug!(path = %root.display(), "Directory scan cancelled");
            break;
        }

        match entry {
            Ok(entry) => {
                let file_type = entry.file_type();
                if file_type.is_dir() {
                    continue;
                }

                stats.files_found.fetch_add(1, Ordering::Relaxed);

                if !file_type.is_file() {
                    stats.files_skipped.fetch_add(1, Ordering::Relaxed);
                    continue;
                }

                coordinator.mark_dirty_owned(owner, entry.path());
                stats.files_queued.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Error walking directory");
                stats.errors.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    let snapshot = stats.snapshot();
    tracing::info!(
        path = %root.display(),
        found = snapshot.files_found,
        queued = snapshot.files_queued,
        skipped = snapshot.files_skipped,
        errors = snapshot.errors,
        "Directory scan complete"
    );

    snapshot
}

/// Async version of directory scan, run on the blocking pool.
///
/// # Errors
///
/// Returns an error if the scan task panicked.
pub async fn scan_directory_async(
    root: PathBuf,
    owner: String,
    coordinator: Arc<IndexCoordinator>,
    cancel: CancellationToken,
) -> Result<ScanStatsSnapshot> {
    tokio::task::spawn_blocking(move || scan_directory(&root, &owner, &coordinator, &cancel))
        .await
        .map_err(|e| crate::Error::internal(format!("Scan task failed: {e}")))
}
