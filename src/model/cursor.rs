//! The persisted synchronization cursor.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Pointer recording how far the history log has been mirrored.
///
/// There is exactly one cursor per installation. `last_processed_seq_id == 0`
/// means no pass has completed yet and the lookback window applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCursor {
    /// When sync was first enabled (cursor bootstrap time).
    pub first_enabled_time: DateTime<Utc>,
    /// Lookback window used by the very first pass only.
    pub lookback_hours: u32,
    /// Highest sequence id handled by a completed pass (0 = unset).
    pub last_processed_seq_id: u64,
    /// When the last pass completed.
    pub last_processed_time: Option<DateTime<Utc>>,
    /// Start of a one-off retroactive window, if requested.
    pub retroactive_start: Option<DateTime<Utc>>,
    /// End of a one-off retroactive window, if requested.
    pub retroactive_end: Option<DateTime<Utc>>,
}

impl SyncCursor {
    /// A fresh cursor as created on the first sync attempt.
    #[must_use]
    pub fn bootstrap(now: DateTime<Utc>, lookback_hours: u32) -> Self {
        Self {
            first_enabled_time: now,
            lookback_hours,
            last_processed_seq_id: 0,
            last_processed_time: None,
            retroactive_start: None,
            retroactive_end: None,
        }
    }

    /// Both retroactive bounds, when a retroactive pass is pending.
    #[must_use]
    pub fn retroactive_range(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        match (self.retroactive_start, self.retroactive_end) {
            (Some(start), Some(end)) => Some((start, end)),
            _ => None,
        }
    }

    /// Whether a previous pass has recorded a position.
    #[must_use]
    pub const fn has_position(&self) -> bool {
        self.last_processed_seq_id > 0
    }

    /// Earliest device time considered by a first sync at `now`.
    ///
    /// A window reaching past the earliest representable time covers the
    /// whole log.
    #[must_use]
    pub fn lookback_time(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        Duration::try_hours(i64::from(self.lookback_hours))
            .and_then(|d| now.checked_sub_signed(d))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}
