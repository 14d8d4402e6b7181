//! File system change watching.
//!
//! This module provides:
//! - Directory watching using notify-rs
//! - Per-path write debouncing into settle events
//! - Semantic events delivered through a `WatchListener`

mod debounce;
mod events;
#[allow(clippy::module_inception)]
mod watcher;

pub use events::{channel_listener, RemoveCause, WatchEvent, WatchListener};
pub use watcher::{ChangeWatcher, WatcherConfig, DEFAULT_WRITE_TIMEOUT};
