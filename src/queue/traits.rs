//! Queue store trait and error types

use crate::queue::{AckOutcome, QueueCounts, QueueItem, RetryPolicy};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during queue store operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// The underlying storage could not be reached or the statement failed.
    /// Fatal at startup; retryable mid-run.
    #[error("queue storage unavailable: {0}")]
    Unavailable(#[from] rusqlite::Error),

    /// A lease claim raced with another status change. Impossible under a
    /// correct atomic implementation; surfaced loudly, never retried.
    #[error("lease conflict: {identifier} changed state during claim")]
    LeaseConflict { identifier: String },

    /// An acknowledgment referenced an identifier the store has never seen
    #[error("queue item not found: {0}")]
    ItemNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for queue store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Trait for the durable work-queue backend
///
/// Every method is one atomic unit against the underlying storage; the
/// collector and the fetcher share no state besides an implementation of
/// this trait.
pub trait QueueStore {
    /// Admits a batch of identifiers, inserting a `pending` row for each one
    /// not already present. Existing rows are left untouched (in particular,
    /// `processed` and `failed` rows are not reset). Returns the number of
    /// genuinely new rows, which the collector uses for progress detection.
    fn insert_new(&mut self, identifiers: &[String]) -> StoreResult<usize>;

    /// Atomically claims up to `max_count` lease-eligible items, oldest
    /// first. Claimed items are marked `leased` with a fresh `leased_at`;
    /// two callers can never receive overlapping sets.
    fn lease_batch(&mut self, max_count: usize) -> StoreResult<Vec<QueueItem>>;

    /// Transitions a leased item to `processed`. Acknowledging an item that
    /// is already `processed` is a no-op and leaves the row untouched.
    fn ack_success(&mut self, identifier: &str) -> StoreResult<()>;

    /// Records a failed attempt. The item returns to `pending` with a
    /// backoff-delayed eligibility window, or becomes terminally `failed`
    /// once `attempts` reaches `max_attempts`.
    fn ack_failure(
        &mut self,
        identifier: &str,
        error: &str,
        max_attempts: u32,
        backoff: &RetryPolicy,
    ) -> StoreResult<AckOutcome>;

    /// Returns leases older than `staleness` to `pending` so that items
    /// stranded by a crashed consumer become eligible again. Returns the
    /// number of reclaimed items.
    fn reclaim_stale(&mut self, staleness: Duration) -> StoreResult<usize>;

    /// Per-status row totals
    fn status_counts(&self) -> StoreResult<QueueCounts>;

    /// Looks up a single item by identifier
    fn item(&self, identifier: &str) -> StoreResult<Option<QueueItem>>;
}
