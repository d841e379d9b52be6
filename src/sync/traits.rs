//! Collaborator seams of the sync core.
//!
//! The coordinator, processors and fetcher only talk to these traits.
//! [`crate::storage::SqliteStorage`] implements both stores and
//! [`crate::nightscout::NightscoutClient`] implements the uploader.

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::model::{LogEntry, SyncCursor};
use crate::sync::types::UploadKind;

/// Append-only local mirror of the device history log.
pub trait LogStore {
    /// Insert an entry unless `(device_id, seq_id)` is already stored.
    ///
    /// Returns `true` when a row was written.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn insert_if_absent(&self, entry: &LogEntry) -> Result<bool>;

    /// Entries with `start <= seq_id <= end`, ascending.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn range(&self, device_id: u32, start: u64, end: u64) -> Result<Vec<LogEntry>>;

    /// Entry with the highest sequence id.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn latest(&self, device_id: u32) -> Result<Option<LogEntry>>;

    /// Entry with the lowest sequence id.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn oldest(&self, device_id: u32) -> Result<Option<LogEntry>>;

    /// Every stored entry for the device, ascending.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn all(&self, device_id: u32) -> Result<Vec<LogEntry>>;

    /// Number of entries with `seq_id > after`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn count_above(&self, device_id: u32, after: u64) -> Result<u64>;

    /// Total number of entries stored for the device.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn count(&self, device_id: u32) -> Result<u64>;

    /// Stored sequence ids in `[start, end]`, ascending.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn sequence_ids_between(&self, device_id: u32, start: u64, end: u64) -> Result<Vec<u64>>;

    /// Up to `limit` entries of the given types stored strictly before
    /// `before_seq`, returned ascending.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn recent_of_types(
        &self,
        device_id: u32,
        type_ids: &[u32],
        before_seq: u64,
        limit: usize,
    ) -> Result<Vec<LogEntry>>;
}

/// Durable home of the single [`SyncCursor`].
pub trait CursorStore {
    /// The cursor, if one was ever created.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn get(&self) -> Result<Option<SyncCursor>>;

    /// Create or replace the cursor.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn upsert(&self, cursor: &SyncCursor) -> Result<()>;

    /// Record the end of a successful pass.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn update_last_processed(&self, seq_id: u64, at: DateTime<Utc>) -> Result<()>;

    /// Set or clear (with `None, None`) the retroactive window.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn set_retroactive_range(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<()>;

    /// Forget the cursor entirely. The next pass bootstraps a new one.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn reset(&self) -> Result<()>;
}

/// Sink for translated records.
pub trait RemoteUploader {
    /// Post a batch to the remote collection for `kind`.
    ///
    /// Returns how many records the remote accepted.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Upload`] when the remote rejects the batch
    /// or cannot be reached.
    fn upload_batch(&self, kind: UploadKind, payloads: &[serde_json::Value]) -> Result<usize>;
}

/// Request side of the device link.
///
/// Responses arrive asynchronously through
/// [`crate::sync::DeviceLogFetcher::on_entry_received`].
pub trait DeviceTransport {
    /// Ask the device for `count` entries starting at `start_seq`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request could not be sent.
    fn request_range(&self, start_seq: u64, count: u32) -> Result<()>;
}
