//! Re-index scheduling.
//!
//! The [`IndexCoordinator`] turns dirty-path signals into calls of a
//! [`Reindex`] routine on a fixed pool of worker threads:
//!
//! - signals for paths outside every root of interest are ignored
//! - at most one run per path is in flight; signals during a run collapse
//!   into one follow-up run
//! - pending work carries an owner label and can be dropped per owner
//! - identifiers produced by runs are fanned out to [`Subscription`]s
//!
//! [`FileReindexer`] is the store-backed routine, optionally paced by
//! [`RateLimiter`]s.

mod coordinator;
mod limiter;
mod reindex;
mod state;
mod stats;
mod subscription;

pub use coordinator::{CoordinatorConfig, IndexCoordinator, DEFAULT_QUEUE_LEN};
pub use limiter::{RateLimiter, DEFAULT_HASH_RATE, DEFAULT_STAT_RATE};
pub use reindex::{resolve_file_id, FileReindexer, Reindex};
pub use state::{PathWorkState, WorkPhase};
pub use stats::{CoordinatorStats, CoordinatorStatsSnapshot};
pub use subscription::{IndexEvent, Subscription};
