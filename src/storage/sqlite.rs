//! SQLite storage implementation.
//!
//! Backs both the history log mirror and the sync cursor. Writes that
//! change the cursor go through [`SqliteStorage::mutate`], which wraps them
//! in a transaction and records audit events.

use crate::error::Result;
use crate::model::{LogEntry, SyncCursor};
use crate::storage::events::{get_events, insert_event, Event, EventType};
use crate::storage::schema::apply_schema;
use crate::sync::{CursorStore, LogStore};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

const CURSOR_ENTITY: &str = "sync_cursor";
const CURSOR_ID: &str = "1";

const LOG_COLUMNS: &str = "device_id, seq_id, type_id, payload, device_time, recorded_time";

/// SQLite-based storage backend.
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Connection,
}

/// Context for a mutation operation.
///
/// Passed to mutation closures so they can record audit events that are
/// written in the same transaction.
pub struct MutationContext {
    /// Actor performing the operation (`sync`, `cli`, ...).
    pub actor: String,
    /// Events to write at the end of the transaction.
    pub events: Vec<Event>,
}

impl MutationContext {
    /// Create a new mutation context.
    #[must_use]
    pub fn new(actor: &str) -> Self {
        Self {
            actor: actor.to_string(),
            events: Vec::new(),
        }
    }

    /// Record an event for this operation.
    pub fn record_event(&mut self, entity_type: &str, entity_id: &str, event_type: EventType) {
        self.events
            .push(Event::new(entity_type, entity_id, event_type, &self.actor));
    }

    /// Record an event with old/new values for field tracking.
    pub fn record_change(
        &mut self,
        entity_type: &str,
        entity_id: &str,
        event_type: EventType,
        old_value: Option<String>,
        new_value: Option<String>,
    ) {
        self.events.push(
            Event::new(entity_type, entity_id, event_type, &self.actor)
                .with_values(old_value, new_value),
        );
    }
}

/// Summary of what the local log mirror holds for one device.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LogStats {
    pub device_id: u32,
    pub count: u64,
    pub oldest_seq_id: Option<u64>,
    pub latest_seq_id: Option<u64>,
    pub oldest_time: Option<DateTime<Utc>>,
    pub latest_time: Option<DateTime<Utc>>,
    /// `(type_id, count)` pairs, most frequent first.
    pub by_type: Vec<(u32, u64)>,
}

impl SqliteStorage {
    /// Open a database at the given path.
    ///
    /// Creates the database and applies schema if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, None)
    }

    /// Open a database with an optional busy timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open_with_timeout(path: &Path, timeout_ms: Option<u64>) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_millis(timeout_ms.unwrap_or(5000)))?;
        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Execute a mutation with the transaction protocol.
    ///
    /// Begins an IMMEDIATE transaction, runs the closure, writes the audit
    /// events it recorded and commits. Any error rolls everything back.
    ///
    /// # Errors
    ///
    /// Returns an error if any step fails.
    pub fn mutate<F, R>(&self, actor: &str, f: F) -> Result<R>
    where
        F: FnOnce(&Transaction, &mut MutationContext) -> Result<R>,
    {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        let mut ctx = MutationContext::new(actor);

        let result = f(&tx, &mut ctx)?;

        for event in &ctx.events {
            insert_event(&tx, event)?;
        }

        tx.commit()?;
        Ok(result)
    }

    // ==================
    // History Log
    // ==================

    /// Insert many entries in one transaction, skipping duplicates.
    ///
    /// Returns the number of rows actually written.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails.
    pub fn insert_batch(&self, entries: &[LogEntry], actor: &str) -> Result<usize> {
        self.mutate(actor, |tx, ctx| {
            let mut inserted = 0;
            for entry in entries {
                inserted += insert_entry(tx, entry)?;
            }
            if inserted > 0 {
                let mut event = Event::new("history_log", "import", EventType::LogImported, &ctx.actor)
                    .with_comment(&format!("{inserted} of {} entries new", entries.len()));
                event.new_value = Some(inserted.to_string());
                ctx.events.push(event);
            }
            Ok(inserted)
        })
    }

    /// Aggregate counts for the `log stats` command.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn log_stats(&self, device_id: u32) -> Result<LogStats> {
        let oldest = self.oldest(device_id)?;
        let latest = self.latest(device_id)?;

        let mut stmt = self.conn.prepare(
            "SELECT type_id, COUNT(*) FROM history_log
             WHERE device_id = ?1
             GROUP BY type_id
             ORDER BY COUNT(*) DESC, type_id ASC",
        )?;
        let by_type = stmt
            .query_map([device_id], |row| {
                Ok((row.get::<_, u32>(0)?, from_sql_count(row.get(1)?)))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(LogStats {
            device_id,
            count: self.count(device_id)?,
            oldest_seq_id: oldest.as_ref().map(|e| e.seq_id),
            latest_seq_id: latest.as_ref().map(|e| e.seq_id),
            oldest_time: oldest.map(|e| e.device_time),
            latest_time: latest.map(|e| e.device_time),
            by_type,
        })
    }

    /// Device ids present in the log mirror.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn device_ids(&self) -> Result<Vec<u32>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT device_id FROM history_log ORDER BY device_id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<u32>>>()?;
        Ok(ids)
    }

    // ==================
    // Sync Cursor
    // ==================

    /// Recent audit events for the cursor, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn cursor_history(&self, limit: u32) -> Result<Vec<Event>> {
        Ok(get_events(&self.conn, CURSOR_ENTITY, CURSOR_ID, Some(limit))?)
    }

    fn query_entries(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<LogEntry>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, map_log_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn query_entry(&self, sql: &str, params: impl rusqlite::Params) -> Result<Option<LogEntry>> {
        Ok(self.conn.query_row(sql, params, map_log_entry).optional()?)
    }
}

impl LogStore for SqliteStorage {
    fn insert_if_absent(&self, entry: &LogEntry) -> Result<bool> {
        Ok(insert_entry(&self.conn, entry)? > 0)
    }

    fn range(&self, device_id: u32, start: u64, end: u64) -> Result<Vec<LogEntry>> {
        self.query_entries(
            &format!(
                "SELECT {LOG_COLUMNS} FROM history_log
                 WHERE device_id = ?1 AND seq_id BETWEEN ?2 AND ?3
                 ORDER BY seq_id ASC"
            ),
            rusqlite::params![device_id, to_sql_seq(start), to_sql_seq(end)],
        )
    }

    fn latest(&self, device_id: u32) -> Result<Option<LogEntry>> {
        self.query_entry(
            &format!(
                "SELECT {LOG_COLUMNS} FROM history_log
                 WHERE device_id = ?1 ORDER BY seq_id DESC LIMIT 1"
            ),
            [device_id],
        )
    }

    fn oldest(&self, device_id: u32) -> Result<Option<LogEntry>> {
        self.query_entry(
            &format!(
                "SELECT {LOG_COLUMNS} FROM history_log
                 WHERE device_id = ?1 ORDER BY seq_id ASC LIMIT 1"
            ),
            [device_id],
        )
    }

    fn all(&self, device_id: u32) -> Result<Vec<LogEntry>> {
        self.query_entries(
            &format!(
                "SELECT {LOG_COLUMNS} FROM history_log
                 WHERE device_id = ?1 ORDER BY seq_id ASC"
            ),
            [device_id],
        )
    }

    fn count_above(&self, device_id: u32, after: u64) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM history_log WHERE device_id = ?1 AND seq_id > ?2",
            rusqlite::params![device_id, to_sql_seq(after)],
            |row| row.get(0),
        )?;
        Ok(from_sql_count(count))
    }

    fn count(&self, device_id: u32) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM history_log WHERE device_id = ?1",
            [device_id],
            |row| row.get(0),
        )?;
        Ok(from_sql_count(count))
    }

    fn sequence_ids_between(&self, device_id: u32, start: u64, end: u64) -> Result<Vec<u64>> {
        let mut stmt = self.conn.prepare(
            "SELECT seq_id FROM history_log
             WHERE device_id = ?1 AND seq_id BETWEEN ?2 AND ?3
             ORDER BY seq_id ASC",
        )?;
        let ids = stmt
            .query_map(
                rusqlite::params![device_id, to_sql_seq(start), to_sql_seq(end)],
                |row| row.get::<_, i64>(0),
            )?
            .map(|r| r.map(from_sql_seq))
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ids)
    }

    fn recent_of_types(
        &self,
        device_id: u32,
        type_ids: &[u32],
        before_seq: u64,
        limit: usize,
    ) -> Result<Vec<LogEntry>> {
        if type_ids.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let types = type_ids
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        let mut entries = self.query_entries(
            &format!(
                "SELECT {LOG_COLUMNS} FROM history_log
                 WHERE device_id = ?1 AND seq_id < ?2 AND type_id IN ({types})
                 ORDER BY seq_id DESC LIMIT ?3"
            ),
            rusqlite::params![
                device_id,
                to_sql_seq(before_seq),
                i64::try_from(limit).unwrap_or(i64::MAX)
            ],
        )?;
        entries.reverse();
        Ok(entries)
    }
}

impl CursorStore for SqliteStorage {
    fn get(&self) -> Result<Option<SyncCursor>> {
        let cursor = self
            .conn
            .query_row(
                "SELECT first_enabled_time, lookback_hours, last_processed_seq_id,
                        last_processed_time, retroactive_start, retroactive_end
                 FROM sync_state WHERE id = 1",
                [],
                |row| {
                    Ok(SyncCursor {
                        first_enabled_time: from_millis(row.get(0)?),
                        lookback_hours: row.get(1)?,
                        last_processed_seq_id: from_sql_seq(row.get(2)?),
                        last_processed_time: row.get::<_, Option<i64>>(3)?.map(from_millis),
                        retroactive_start: row.get::<_, Option<i64>>(4)?.map(from_millis),
                        retroactive_end: row.get::<_, Option<i64>>(5)?.map(from_millis),
                    })
                },
            )
            .optional()?;
        Ok(cursor)
    }

    fn upsert(&self, cursor: &SyncCursor) -> Result<()> {
        self.mutate("sync", |tx, ctx| {
            let existed = tx
                .query_row("SELECT 1 FROM sync_state WHERE id = 1", [], |_| Ok(()))
                .optional()?
                .is_some();
            tx.execute(
                "INSERT INTO sync_state (id, first_enabled_time, lookback_hours, last_processed_seq_id,
                                         last_processed_time, retroactive_start, retroactive_end, updated_at)
                 VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(id) DO UPDATE SET
                     first_enabled_time = excluded.first_enabled_time,
                     lookback_hours = excluded.lookback_hours,
                     last_processed_seq_id = excluded.last_processed_seq_id,
                     last_processed_time = excluded.last_processed_time,
                     retroactive_start = excluded.retroactive_start,
                     retroactive_end = excluded.retroactive_end,
                     updated_at = excluded.updated_at",
                rusqlite::params![
                    cursor.first_enabled_time.timestamp_millis(),
                    cursor.lookback_hours,
                    to_sql_seq(cursor.last_processed_seq_id),
                    cursor.last_processed_time.map(|t| t.timestamp_millis()),
                    cursor.retroactive_start.map(|t| t.timestamp_millis()),
                    cursor.retroactive_end.map(|t| t.timestamp_millis()),
                    Utc::now().timestamp_millis(),
                ],
            )?;
            if !existed {
                ctx.events.push(
                    Event::new(CURSOR_ENTITY, CURSOR_ID, EventType::CursorCreated, &ctx.actor)
                        .with_comment(&format!("{}h lookback", cursor.lookback_hours)),
                );
            }
            Ok(())
        })
    }

    fn update_last_processed(&self, seq_id: u64, at: DateTime<Utc>) -> Result<()> {
        self.mutate("sync", |tx, ctx| {
            let old: Option<i64> = tx
                .query_row(
                    "SELECT last_processed_seq_id FROM sync_state WHERE id = 1",
                    [],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(old) = old else {
                return Err(crate::Error::Other(
                    "cannot advance a sync cursor that does not exist".to_string(),
                ));
            };
            tx.execute(
                "UPDATE sync_state
                 SET last_processed_seq_id = ?1, last_processed_time = ?2, updated_at = ?3
                 WHERE id = 1",
                rusqlite::params![
                    to_sql_seq(seq_id),
                    at.timestamp_millis(),
                    Utc::now().timestamp_millis()
                ],
            )?;
            ctx.record_change(
                CURSOR_ENTITY,
                CURSOR_ID,
                EventType::CursorAdvanced,
                Some(from_sql_seq(old).to_string()),
                Some(seq_id.to_string()),
            );
            Ok(())
        })
    }

    fn set_retroactive_range(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<()> {
        self.mutate("sync", |tx, ctx| {
            let changed = tx.execute(
                "UPDATE sync_state
                 SET retroactive_start = ?1, retroactive_end = ?2, updated_at = ?3
                 WHERE id = 1",
                rusqlite::params![
                    start.map(|t| t.timestamp_millis()),
                    end.map(|t| t.timestamp_millis()),
                    Utc::now().timestamp_millis()
                ],
            )?;
            if changed == 0 {
                return Err(crate::Error::Other(
                    "cannot set a retroactive range before the sync cursor exists".to_string(),
                ));
            }
            match (start, end) {
                (None, None) => {
                    ctx.record_event(CURSOR_ENTITY, CURSOR_ID, EventType::RetroactiveCleared);
                }
                _ => ctx.record_change(
                    CURSOR_ENTITY,
                    CURSOR_ID,
                    EventType::RetroactiveRequested,
                    start.map(|t| t.to_rfc3339()),
                    end.map(|t| t.to_rfc3339()),
                ),
            }
            Ok(())
        })
    }

    fn reset(&self) -> Result<()> {
        self.mutate("cli", |tx, ctx| {
            tx.execute("DELETE FROM sync_state WHERE id = 1", [])?;
            ctx.record_event(CURSOR_ENTITY, CURSOR_ID, EventType::CursorReset);
            Ok(())
        })
    }
}

fn insert_entry(conn: &Connection, entry: &LogEntry) -> Result<usize> {
    Ok(conn.execute(
        &format!("INSERT OR IGNORE INTO history_log ({LOG_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"),
        rusqlite::params![
            entry.device_id,
            to_sql_seq(entry.seq_id),
            entry.type_id,
            entry.payload,
            entry.device_time.timestamp_millis(),
            entry.recorded_time.timestamp_millis(),
        ],
    )?)
}

fn map_log_entry(row: &Row<'_>) -> rusqlite::Result<LogEntry> {
    Ok(LogEntry {
        device_id: row.get(0)?,
        seq_id: from_sql_seq(row.get(1)?),
        type_id: row.get(2)?,
        payload: row.get(3)?,
        device_time: from_millis(row.get(4)?),
        recorded_time: from_millis(row.get(5)?),
    })
}

/// SQLite integers are signed; ids beyond `i64::MAX` saturate, which keeps
/// `u64::MAX` usable as an open range bound.
fn to_sql_seq(seq_id: u64) -> i64 {
    i64::try_from(seq_id).unwrap_or(i64::MAX)
}

fn from_sql_seq(value: i64) -> u64 {
    u64::try_from(value).unwrap_or_default()
}

fn from_sql_count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or_default()
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}
