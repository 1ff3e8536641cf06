//! Durable work queue shared by the collector and the fetcher
//!
//! This module handles all persistence for the harvest pipeline, including:
//! - SQLite database initialization and schema management
//! - Insert-if-new admission of discovered identifiers
//! - Atomic batch leasing with exclusive claims
//! - Success/failure acknowledgment and retry accounting
//! - Reclaiming leases abandoned by a crashed consumer

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteQueue;
pub use traits::{QueueStore, StoreError, StoreResult};

use std::fmt;
use std::time::Duration;

/// Lifecycle status of a queue item
///
/// The database strings are part of the operational surface (external tooling
/// queries the table directly), so the four literals must stay stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemStatus {
    /// Eligible for leasing (initial state, and the retry state)
    Pending,

    /// Claimed by exactly one consumer task
    Leased,

    /// Terminal success
    Processed,

    /// Terminal failure after exhausting retries
    Failed,
}

impl ItemStatus {
    /// Returns true if no further processing will happen without an external reset
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Processed | Self::Failed)
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Leased => "leased",
            Self::Processed => "processed",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "leased" => Some(Self::Leased),
            "processed" => Some(Self::Processed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// One row of the work queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueItem {
    /// Canonical identifier (the recipe URL); unique across the table
    pub identifier: String,
    pub status: ItemStatus,
    /// Count of lease-then-failure cycles so far
    pub attempts: u32,
    /// Most recent failure message, cleared on success
    pub last_error: Option<String>,
    /// RFC 3339 timestamp of the most recent lease grant
    pub leased_at: Option<String>,
    /// Earliest lease eligibility after a failure (backoff), RFC 3339
    pub retry_after: Option<String>,
    pub first_seen_at: String,
    pub updated_at: String,
}

/// Result of acknowledging a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// The item went back to `pending` and will be leased again after its backoff
    Retrying,

    /// The item hit the attempt ceiling and is now terminally `failed`
    Exhausted,
}

/// Per-status row totals, used for milestone reporting and the stats command
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueCounts {
    pub pending: u64,
    pub leased: u64,
    pub processed: u64,
    pub failed: u64,
}

impl QueueCounts {
    pub fn total(&self) -> u64 {
        self.pending + self.leased + self.processed + self.failed
    }
}

/// Exponential backoff schedule for failed items
///
/// The delay doubles with every recorded failure and is clamped to `cap`, so
/// the gap between lease-eligibility windows is non-decreasing.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub base: Duration,
    pub cap: Duration,
}

impl RetryPolicy {
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self { base, cap }
    }

    /// Delay before the item becomes lease-eligible again, given its new
    /// attempt count (1 = first failure).
    pub fn delay(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1).min(16);
        self.base
            .saturating_mul(1u32 << exponent)
            .min(self.cap)
    }
}
