//! Nightscout wire records.
//!
//! Field names follow the Nightscout REST API. Optional fields are left out
//! of the JSON body instead of being sent as `null`.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Value of the `device` / `enteredBy` fields on every uploaded record.
pub const DEVICE_NAME: &str = "pumpsync";

fn iso(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// CGM entry (`/api/v1/entries`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Glucose value in mg/dL. Absent on non-sgv entries read back.
    #[serde(default)]
    pub sgv: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
    /// Unix milliseconds.
    pub date: i64,
    #[serde(rename = "dateString", default)]
    pub date_string: String,
    #[serde(default)]
    pub device: String,
    /// Originating sequence id, used for deduplication.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
}

impl Entry {
    /// Sensor glucose entry for the reading logged at `time`.
    #[must_use]
    pub fn sgv(time: DateTime<Utc>, sgv: i32, direction: Option<&str>, seq_id: u64) -> Self {
        Self {
            kind: "sgv".to_string(),
            sgv,
            direction: direction.map(str::to_string),
            date: time.timestamp_millis(),
            date_string: iso(time),
            device: DEVICE_NAME.to_string(),
            identifier: Some(seq_id.to_string()),
        }
    }
}

/// Treatment (`/api/v1/treatments`): boluses, temp basals, notes, ...
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Treatment {
    pub event_type: String,
    #[serde(rename = "created_at")]
    pub created_at: String,
    /// Unix milliseconds.
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insulin: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub carbs: Option<f64>,
    /// Minutes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    /// U/hr.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate: Option<f64>,
    /// U/hr.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub absolute: Option<f64>,
    /// Extended portion of a bolus, in units.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relative: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub entered_by: String,
    /// Originating sequence id, used for deduplication.
    pub pump_id: String,
    pub device: String,
}

impl Treatment {
    /// Bare treatment of `event_type` at `time`; fill optional fields with
    /// the `with_*` builders.
    #[must_use]
    pub fn new(event_type: &str, time: DateTime<Utc>, seq_id: u64) -> Self {
        Self {
            event_type: event_type.to_string(),
            created_at: iso(time),
            timestamp: time.timestamp_millis(),
            insulin: None,
            carbs: None,
            duration: None,
            rate: None,
            absolute: None,
            relative: None,
            reason: None,
            notes: None,
            entered_by: DEVICE_NAME.to_string(),
            pump_id: seq_id.to_string(),
            device: DEVICE_NAME.to_string(),
        }
    }

    #[must_use]
    pub fn with_insulin(mut self, units: Option<f64>) -> Self {
        self.insulin = units;
        self
    }

    #[must_use]
    pub fn with_carbs(mut self, grams: Option<f64>) -> Self {
        self.carbs = grams;
        self
    }

    #[must_use]
    pub fn with_duration(mut self, minutes: Option<u32>) -> Self {
        self.duration = minutes;
        self
    }

    /// Set both `rate` and `absolute` to the same U/hr value.
    #[must_use]
    pub fn with_rate(mut self, units_per_hour: f64) -> Self {
        self.rate = Some(units_per_hour);
        self.absolute = Some(units_per_hour);
        self
    }

    #[must_use]
    pub fn with_relative(mut self, units: Option<f64>) -> Self {
        self.relative = units;
        self
    }

    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Device status snapshot (`/api/v1/devicestatus`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatus {
    #[serde(rename = "created_at")]
    pub created_at: String,
    pub device: String,
    pub pump: PumpStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploader_battery: Option<u8>,
    /// Sequence id of the newest entry that fed this snapshot.
    pub pump_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PumpStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery: Option<Battery>,
    /// Remaining insulin in units.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reservoir: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iob: Option<Iob>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PumpStatusInfo>,
    pub clock: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Battery {
    pub percent: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Iob {
    pub iob: f64,
    pub timestamp: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PumpStatusInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bolusing: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suspended: Option<bool>,
    pub timestamp: String,
}

impl DeviceStatus {
    /// Snapshot at `time` from the aggregated pump fields.
    #[must_use]
    pub fn at(
        time: DateTime<Utc>,
        seq_id: u64,
        battery_percent: Option<u8>,
        reservoir_units: Option<f64>,
        iob_units: Option<f64>,
        status: Option<PumpStatusInfo>,
    ) -> Self {
        let stamp = iso(time);
        Self {
            created_at: stamp.clone(),
            device: DEVICE_NAME.to_string(),
            pump: PumpStatus {
                battery: battery_percent.map(|percent| Battery { percent }),
                reservoir: reservoir_units,
                iob: iob_units.map(|iob| Iob {
                    iob,
                    timestamp: stamp.clone(),
                }),
                status,
                clock: stamp,
            },
            uploader_battery: None,
            pump_id: seq_id.to_string(),
        }
    }
}
