//! Database schema definitions.
//!
//! Timestamps are stored as INTEGER (Unix milliseconds). JSON payloads are
//! stored as TEXT exactly as the caller produced them.

use rusqlite::{Connection, Result};

/// Current schema version for migration tracking.
pub const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Base SQL schema for the fieldsync database.
///
/// This is the first released shape. Later changes live in `migrations/`
/// and are applied on top of it.
pub const SCHEMA_SQL: &str = r#"
-- ====================
-- Schema Version Tracking
-- ====================

CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at INTEGER NOT NULL
);

-- ====================
-- Sync Queue
-- ====================

-- Pending operations, in upload order
CREATE TABLE IF NOT EXISTS sync_queue (
    id TEXT PRIMARY KEY,
    position INTEGER NOT NULL,
    entity_type TEXT NOT NULL CHECK (entity_type IN ('job', 'node', 'route')),
    entity_id TEXT,
    operation TEXT NOT NULL CHECK (operation IN ('create', 'update', 'delete')),
    payload TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    retry_count INTEGER NOT NULL DEFAULT 0,
    last_attempt_at INTEGER
);

CREATE INDEX IF NOT EXISTS idx_sync_queue_position ON sync_queue(position);
CREATE INDEX IF NOT EXISTS idx_sync_queue_entity ON sync_queue(entity_type, entity_id);

-- Abandoned operations, kept for inspection and requeue
CREATE TABLE IF NOT EXISTS dead_letters (
    id TEXT PRIMARY KEY,
    entity_type TEXT NOT NULL,
    entity_id TEXT,
    operation TEXT NOT NULL,
    payload TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    retry_count INTEGER NOT NULL DEFAULT 0,
    last_attempt_at INTEGER,
    last_error TEXT,
    reason TEXT NOT NULL CHECK (reason IN ('exhausted', 'rejected')),
    error TEXT NOT NULL,
    abandoned_at INTEGER NOT NULL
);

-- ====================
-- Replicas
-- ====================

-- Last version both sides agreed on (merge base)
CREATE TABLE IF NOT EXISTS sync_bases (
    entity_type TEXT NOT NULL,
    entity_id TEXT NOT NULL,
    payload TEXT NOT NULL,
    updated_at INTEGER,
    saved_at INTEGER NOT NULL,
    PRIMARY KEY (entity_type, entity_id)
);

-- Local copy of every record the device knows about
CREATE TABLE IF NOT EXISTS records (
    entity_type TEXT NOT NULL,
    entity_id TEXT NOT NULL,
    payload TEXT NOT NULL,
    updated_at INTEGER NOT NULL DEFAULT 0,
    synced_at INTEGER,
    unsynced_changes INTEGER NOT NULL DEFAULT 1,
    PRIMARY KEY (entity_type, entity_id)
);

CREATE INDEX IF NOT EXISTS idx_records_updated ON records(entity_type, updated_at);

-- Last successful full sync, per scope
CREATE TABLE IF NOT EXISTS watermarks (
    scope TEXT PRIMARY KEY,
    at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

-- ====================
-- Audit
-- ====================

CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    event_type TEXT NOT NULL,
    item_id TEXT,
    actor TEXT NOT NULL,
    detail TEXT,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_events_item ON events(item_id, created_at);
"#;

/// Apply the schema to the database.
///
/// Idempotent: every statement uses `IF NOT EXISTS`.
///
/// # Errors
///
/// Returns an error if the SQL execution fails or pragmas cannot be set.
pub fn apply_schema(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;

    conn.execute_batch(SCHEMA_SQL)?;

    super::migrations::run_migrations(conn)?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
        rusqlite::params![
            format!("v{CURRENT_SCHEMA_VERSION}"),
            chrono::Utc::now().timestamp_millis()
        ],
    )?;

    Ok(())
}
