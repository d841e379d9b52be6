//! History log entries as stored locally.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One record of the device history log.
///
/// Uniquely identified by `(device_id, seq_id)`. Entries are immutable
/// once stored; duplicates are dropped on insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Sequence number assigned by the device. Strictly increasing per device.
    pub seq_id: u64,
    /// Short device serial the entry came from.
    pub device_id: u32,
    /// History log type identifier (see [`super::type_ids`]).
    pub type_id: u32,
    /// Raw type-specific cargo as received from the device.
    #[serde(default)]
    pub payload: Vec<u8>,
    /// Timestamp reported by the device clock.
    pub device_time: DateTime<Utc>,
    /// When the entry was received by this host.
    pub recorded_time: DateTime<Utc>,
}

impl LogEntry {
    /// Create an entry received now.
    #[must_use]
    pub fn new(
        device_id: u32,
        seq_id: u64,
        type_id: u32,
        payload: Vec<u8>,
        device_time: DateTime<Utc>,
    ) -> Self {
        Self {
            seq_id,
            device_id,
            type_id,
            payload,
            device_time,
            recorded_time: Utc::now(),
        }
    }
}
