//! Error types and Result aliases for fsindex.
//!
//! This module defines the error hierarchy used throughout the crate.
//! All public functions return `Result<T, Error>` or `Result<T>`.

use thiserror::Error;

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for fsindex operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// File watching error.
    #[error("watcher error: {0}")]
    Watcher(#[from] WatcherError),

    /// Indexing error.
    #[error("index error: {0}")]
    Index(#[from] IndexError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// File watcher errors.
#[derive(Error, Debug)]
pub enum WatcherError {
    /// Failed to watch path.
    #[error("failed to watch path '{path}': {reason}")]
    WatchFailed { path: String, reason: String },

    /// Path exists but is not a directory.
    #[error("path '{0}' is not a directory")]
    NotADirectory(String),

    /// Path is already being watched.
    #[error("path '{0}' is already watched")]
    AlreadyWatched(String),

    /// Path is not being watched.
    #[error("path '{0}' is not watched")]
    NotWatched(String),

    /// Error reported by the OS event backend after construction.
    #[error("event backend error: {0}")]
    Backend(String),

    /// No async runtime available to drive event dispatch and timers.
    #[error("no tokio runtime: {0}")]
    Runtime(String),
}

/// Indexing errors.
#[derive(Error, Debug)]
pub enum IndexError {
    /// Path rejected by the store, such as a relative one.
    #[error("invalid path '{0}'")]
    InvalidPath(String),

    /// Computing the content identifier failed.
    #[error("failed to resolve object id for '{path}': {reason}")]
    Resolve { path: String, reason: String },

    /// Worker pool error.
    #[error("worker pool error: {0}")]
    WorkerPool(String),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl WatcherError {
    /// Create a watch failure for `path`.
    pub fn watch_failed(path: &std::path::Path, reason: impl ToString) -> Self {
        Self::WatchFailed {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }
}

impl IndexError {
    /// Create a resolve failure for `path`.
    pub fn resolve(path: &std::path::Path, reason: impl ToString) -> Self {
        Self::Resolve {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests;
