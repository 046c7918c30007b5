//! The feed refresh core.
//!
//! - [`retry`] - per-feed backoff state machine with pure transitions
//! - [`scheduler`] - the refresh loop: eligibility, fetching, commit, sleep
//! - [`snapshot`] - merging per-feed items into one rendered page
//! - [`status`] - read-only projection of retry state
//!
//! # Cycle
//!
//! Each cycle copies the registry and retry table, releases the lock, fetches
//! every eligible feed (skipping those still in backoff), then takes the
//! write lock once to store retry transitions and, if any feed produced items,
//! publish a new [`Snapshot`]. A cycle in which nothing succeeded leaves the
//! previous snapshot in place.

mod retry;
mod scheduler;
mod snapshot;
mod status;

pub use retry::{BackoffPolicy, RetryState};
pub use scheduler::{
    warm_start_delay, Clock, CycleReport, RefreshScheduler, RefreshSettings, SystemClock,
};
pub use snapshot::{headline_order, Article, Section, Snapshot, SnapshotBuilder};
pub use status::FeedStatus;
