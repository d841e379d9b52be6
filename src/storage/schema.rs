//! Database schema definitions.
//!
//! Holds the DDL for the pumpsync database and records the schema version
//! it was created with.

use rusqlite::{Connection, Result};

/// Schema version recorded in `schema_migrations`.
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// The complete SQL schema for the pumpsync database.
///
/// Timestamps are stored as INTEGER (Unix milliseconds).
pub const SCHEMA_SQL: &str = r"
-- ====================
-- Schema Version Tracking
-- ====================

CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at INTEGER NOT NULL
);

-- ====================
-- Device History Log
-- ====================

-- Append-only mirror of the device log. Rows are never updated.
CREATE TABLE IF NOT EXISTS history_log (
    device_id INTEGER NOT NULL,
    seq_id INTEGER NOT NULL,
    type_id INTEGER NOT NULL,
    payload BLOB NOT NULL,
    device_time INTEGER NOT NULL,
    recorded_time INTEGER NOT NULL,
    PRIMARY KEY (device_id, seq_id)
);

CREATE INDEX IF NOT EXISTS idx_history_log_device_time
    ON history_log(device_id, device_time);
CREATE INDEX IF NOT EXISTS idx_history_log_type
    ON history_log(device_id, type_id, seq_id);

-- ====================
-- Sync Cursor
-- ====================

-- Exactly one row (id = 1) per installation.
CREATE TABLE IF NOT EXISTS sync_state (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    first_enabled_time INTEGER NOT NULL,
    lookback_hours INTEGER NOT NULL,
    last_processed_seq_id INTEGER NOT NULL DEFAULT 0,
    last_processed_time INTEGER,
    retroactive_start INTEGER,
    retroactive_end INTEGER,
    updated_at INTEGER NOT NULL
);

-- ====================
-- Audit Events
-- ====================

CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    entity_type TEXT NOT NULL,
    entity_id TEXT NOT NULL,
    event_type TEXT NOT NULL,
    actor TEXT NOT NULL,
    old_value TEXT,
    new_value TEXT,
    comment TEXT,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id);
CREATE INDEX IF NOT EXISTS idx_events_created ON events(created_at);
";

/// Apply the schema to the database.
///
/// Idempotent: every statement uses `IF NOT EXISTS` and the version row is
/// only inserted once.
///
/// # Errors
///
/// Returns an error if the SQL execution fails or pragmas cannot be set.
pub fn apply_schema(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;

    conn.execute_batch(SCHEMA_SQL)?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
        rusqlite::params![
            format!("v{CURRENT_SCHEMA_VERSION}"),
            chrono::Utc::now().timestamp_millis()
        ],
    )?;

    Ok(())
}
