//! JSONL history log files.
//!
//! Captured history logs can be loaded into the local store with
//! `pumpsync log import`. Each line holds one entry:
//!
//! ```json
//! {"seq_id":1042,"type_id":399,"payload":[0,0,0,0,0,0,110,0],"device_time":"2024-05-01T10:00:00Z"}
//! ```
//!
//! `device_id` may be omitted and supplied on the command line instead.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::LogEntry;

/// One line of an import file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRecord {
    pub seq_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<u32>,
    pub type_id: u32,
    #[serde(default)]
    pub payload: Vec<u8>,
    pub device_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded_time: Option<DateTime<Utc>>,
}

impl ImportRecord {
    /// Convert to a log entry, using `default_device` when the line names
    /// no device.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if neither the record nor the
    /// caller supplies a device id.
    pub fn into_entry(self, default_device: Option<u32>) -> Result<LogEntry> {
        let device_id = self.device_id.or(default_device).ok_or_else(|| {
            Error::InvalidArgument(format!(
                "Entry {} has no device_id; pass --device",
                self.seq_id
            ))
        })?;

        let mut entry = LogEntry::new(
            device_id,
            self.seq_id,
            self.type_id,
            self.payload,
            self.device_time,
        );
        if let Some(recorded) = self.recorded_time {
            entry.recorded_time = recorded;
        }
        Ok(entry)
    }
}

/// Read every record from a JSONL file. Blank lines are skipped.
///
/// # Errors
///
/// Returns an error if:
/// - The file cannot be opened or read
/// - Any line is not a valid record (the error names the line)
pub fn read_jsonl(path: &Path) -> Result<Vec<ImportRecord>> {
    if !path.exists() {
        return Err(Error::InvalidArgument(format!(
            "File not found: {}",
            path.display()
        )));
    }

    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }

        let record: ImportRecord = serde_json::from_str(&line).map_err(|e| {
            Error::InvalidArgument(format!(
                "{}:{}: invalid log entry: {e}",
                path.display(),
                line_num + 1
            ))
        })?;
        records.push(record);
    }

    Ok(records)
}
