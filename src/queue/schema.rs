//! Database schema for the work queue

/// SQL schema for the queue database
pub const SCHEMA_SQL: &str = r#"
-- One row per discovered identifier; rows are never deleted, only moved
-- through the pending/leased/processed/failed lifecycle.
CREATE TABLE IF NOT EXISTS queue_items (
    identifier TEXT PRIMARY KEY,
    status TEXT NOT NULL DEFAULT 'pending',
    attempts INTEGER NOT NULL DEFAULT 0,
    last_error TEXT,
    leased_at TEXT,
    retry_after TEXT,
    first_seen_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_queue_items_status ON queue_items(status);
CREATE INDEX IF NOT EXISTS idx_queue_items_lease_order
    ON queue_items(status, first_seen_at);
"#;

/// Initializes the queue schema
///
/// Safe to call on an already-initialized database.
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
