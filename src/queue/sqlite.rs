//! SQLite implementation of the queue store
//!
//! All mutating operations run inside a single transaction, which is what
//! makes the lease claim atomic: selection and status mutation commit as one
//! unit, so concurrent consumers never receive overlapping batches.

use crate::queue::schema::initialize_schema;
use crate::queue::traits::{QueueStore, StoreError, StoreResult};
use crate::queue::{AckOutcome, ItemStatus, QueueCounts, QueueItem, RetryPolicy};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::time::Duration;

/// SQLite-backed work queue
pub struct SqliteQueue {
    conn: Connection,
}

impl SqliteQueue {
    /// Opens (or creates) the queue database at the given path
    ///
    /// Parent directories are created as needed. Fails with
    /// `StoreError::Unavailable` if the database cannot be opened, which is
    /// fatal at startup.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory queue (for testing)
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

const ITEM_COLUMNS: &str = "identifier, status, attempts, last_error, leased_at, retry_after, \
     first_seen_at, updated_at";

fn row_to_item(row: &Row<'_>) -> rusqlite::Result<QueueItem> {
    let status: String = row.get(1)?;
    Ok(QueueItem {
        identifier: row.get(0)?,
        status: ItemStatus::from_db_string(&status).unwrap_or(ItemStatus::Failed),
        attempts: row.get(2)?,
        last_error: row.get(3)?,
        leased_at: row.get(4)?,
        retry_after: row.get(5)?,
        first_seen_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

impl QueueStore for SqliteQueue {
    fn insert_new(&mut self, identifiers: &[String]) -> StoreResult<usize> {
        if identifiers.is_empty() {
            return Ok(0);
        }

        let now = now_rfc3339();
        let tx = self.conn.transaction()?;
        let mut inserted = 0usize;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO queue_items (identifier, status, first_seen_at, updated_at)
                 VALUES (?1, 'pending', ?2, ?2)
                 ON CONFLICT(identifier) DO NOTHING",
            )?;
            for identifier in identifiers {
                inserted += stmt.execute(params![identifier, now])?;
            }
        }
        tx.commit()?;

        Ok(inserted)
    }

    fn lease_batch(&mut self, max_count: usize) -> StoreResult<Vec<QueueItem>> {
        if max_count == 0 {
            return Ok(Vec::new());
        }

        let now = now_rfc3339();
        let tx = self.conn.transaction()?;

        let mut items = {
            let mut stmt = tx.prepare_cached(&format!(
                "SELECT {ITEM_COLUMNS} FROM queue_items
                 WHERE status = 'pending'
                   AND (retry_after IS NULL OR retry_after <= ?1)
                 ORDER BY first_seen_at ASC, identifier ASC
                 LIMIT ?2"
            ))?;
            let rows = stmt
                .query_map(params![now, max_count as i64], row_to_item)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };

        {
            let mut claim = tx.prepare_cached(
                "UPDATE queue_items
                 SET status = 'leased', leased_at = ?1, retry_after = NULL, updated_at = ?1
                 WHERE identifier = ?2 AND status = 'pending'",
            )?;
            for item in &mut items {
                let claimed = claim.execute(params![now, item.identifier])?;
                if claimed != 1 {
                    // The row left `pending` between selection and claim
                    // inside our own transaction: a store-layer bug.
                    return Err(StoreError::LeaseConflict {
                        identifier: item.identifier.clone(),
                    });
                }
                item.status = ItemStatus::Leased;
                item.leased_at = Some(now.clone());
                item.retry_after = None;
                item.updated_at = now.clone();
            }
        }

        tx.commit()?;
        Ok(items)
    }

    fn ack_success(&mut self, identifier: &str) -> StoreResult<()> {
        let now = now_rfc3339();
        let tx = self.conn.transaction()?;

        let status: Option<String> = tx
            .query_row(
                "SELECT status FROM queue_items WHERE identifier = ?1",
                params![identifier],
                |row| row.get(0),
            )
            .optional()?;

        match status.as_deref() {
            None => return Err(StoreError::ItemNotFound(identifier.to_string())),
            // Redelivery after a previous success: leave the row untouched.
            Some("processed") => {}
            Some(_) => {
                tx.execute(
                    "UPDATE queue_items
                     SET status = 'processed', leased_at = NULL, retry_after = NULL,
                         last_error = NULL, updated_at = ?1
                     WHERE identifier = ?2",
                    params![now, identifier],
                )?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn ack_failure(
        &mut self,
        identifier: &str,
        error: &str,
        max_attempts: u32,
        backoff: &RetryPolicy,
    ) -> StoreResult<AckOutcome> {
        let now_ts = Utc::now();
        let now = now_ts.to_rfc3339();
        let tx = self.conn.transaction()?;

        let attempts: Option<u32> = tx
            .query_row(
                "SELECT attempts FROM queue_items WHERE identifier = ?1",
                params![identifier],
                |row| row.get(0),
            )
            .optional()?;
        let attempts = attempts
            .ok_or_else(|| StoreError::ItemNotFound(identifier.to_string()))?
            + 1;

        let outcome = if attempts >= max_attempts {
            tx.execute(
                "UPDATE queue_items
                 SET status = 'failed', attempts = ?1, last_error = ?2,
                     leased_at = NULL, retry_after = NULL, updated_at = ?3
                 WHERE identifier = ?4",
                params![attempts, error, now, identifier],
            )?;
            AckOutcome::Exhausted
        } else {
            let delay = backoff.delay(attempts);
            let eligible =
                (now_ts + chrono::Duration::milliseconds(delay.as_millis() as i64)).to_rfc3339();
            tx.execute(
                "UPDATE queue_items
                 SET status = 'pending', attempts = ?1, last_error = ?2,
                     leased_at = NULL, retry_after = ?3, updated_at = ?4
                 WHERE identifier = ?5",
                params![attempts, error, eligible, now, identifier],
            )?;
            AckOutcome::Retrying
        };

        tx.commit()?;
        Ok(outcome)
    }

    fn reclaim_stale(&mut self, staleness: Duration) -> StoreResult<usize> {
        let now_ts = Utc::now();
        let cutoff =
            (now_ts - chrono::Duration::milliseconds(staleness.as_millis() as i64)).to_rfc3339();
        let now = now_ts.to_rfc3339();

        let reclaimed = self.conn.execute(
            "UPDATE queue_items
             SET status = 'pending', leased_at = NULL, updated_at = ?1
             WHERE status = 'leased' AND leased_at <= ?2",
            params![now, cutoff],
        )?;

        Ok(reclaimed)
    }

    fn status_counts(&self) -> StoreResult<QueueCounts> {
        let mut stmt = self
            .conn
            .prepare("SELECT status, COUNT(*) FROM queue_items GROUP BY status")?;

        let mut counts = QueueCounts::default();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (status, count) = row?;
            match ItemStatus::from_db_string(&status) {
                Some(ItemStatus::Pending) => counts.pending = count as u64,
                Some(ItemStatus::Leased) => counts.leased = count as u64,
                Some(ItemStatus::Processed) => counts.processed = count as u64,
                Some(ItemStatus::Failed) => counts.failed = count as u64,
                None => {}
            }
        }

        Ok(counts)
    }

    fn item(&self, identifier: &str) -> StoreResult<Option<QueueItem>> {
        let item = self
            .conn
            .query_row(
                &format!("SELECT {ITEM_COLUMNS} FROM queue_items WHERE identifier = ?1"),
                params![identifier],
                row_to_item,
            )
            .optional()?;
        Ok(item)
    }
}
