//! Daily basal summaries → one aggregated `devicestatus` record per batch.

use tracing::debug;

use super::payload::{round3, PayloadReader};
use super::{translate_each, upload, ProcessContext, Processor};
use crate::error::Result;
use crate::model::type_ids::DAILY_BASAL;
use crate::model::{LogEntry, ProcessorCategory};
use crate::nightscout::{DeviceStatus, PumpStatusInfo};
use crate::sync::UploadKind;

pub struct DeviceStatusProcessor;

/// Fields of one daily basal record. Zero battery and negative IOB are
/// treated as unreported.
struct DailyBasal {
    daily_total: f64,
    iob: Option<f64>,
    battery_percent: Option<u8>,
}

impl DailyBasal {
    fn decode(entry: &LogEntry) -> Result<Self> {
        let r = PayloadReader::new(entry);
        r.require(12)?;
        let iob = f64::from(r.f32(8)?);
        Ok(Self {
            daily_total: round3(f64::from(r.f32(0)?)),
            iob: (iob >= 0.0).then(|| round3(iob)),
            battery_percent: r.u8(12).ok().filter(|b| *b > 0),
        })
    }
}

impl Processor for DeviceStatusProcessor {
    fn category(&self) -> ProcessorCategory {
        ProcessorCategory::DeviceStatus
    }

    fn process(&self, entries: &[LogEntry], ctx: &ProcessContext<'_>) -> Result<usize> {
        let decoded = translate_each(self.category(), entries, |entry| {
            if entry.type_id != DAILY_BASAL {
                return Ok(None);
            }
            Ok(Some((entry.seq_id, entry.device_time, DailyBasal::decode(entry)?)))
        });

        let Some((seq_id, stamp, newest)) = decoded.last() else {
            return Ok(0);
        };

        // Newest reported value wins per field.
        let battery = decoded.iter().rev().find_map(|(_, _, d)| d.battery_percent);
        let iob = decoded.iter().rev().find_map(|(_, _, d)| d.iob);
        if battery.is_none() && iob.is_none() {
            debug!(count = decoded.len(), "No battery or IOB reported, skipping status");
            return Ok(0);
        }
        debug!(
            daily_total = newest.daily_total,
            ?battery,
            ?iob,
            "Aggregated device status"
        );

        let status = DeviceStatus::at(
            *stamp,
            *seq_id,
            battery,
            None,
            iob,
            Some(PumpStatusInfo {
                status: Some("normal".to_string()),
                timestamp: stamp.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
                ..PumpStatusInfo::default()
            }),
        );
        upload(self.category(), UploadKind::DeviceStatus, &[status], ctx.uploader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStorage;
    use crate::sync::processors::testing::{entry_at, run, Bytes, RecordingUploader};

    fn daily(seq_id: u64, iob: f32, battery: u8, minutes: i64) -> LogEntry {
        let payload = Bytes::default()
            .f32(18.5)
            .f32(0.8)
            .f32(iob)
            .u8(battery)
            .done();
        entry_at(seq_id, DAILY_BASAL, payload, minutes)
    }

    #[test]
    fn test_aggregates_into_single_status() {
        let store = SqliteStorage::open_memory().unwrap();
        let uploader = RecordingUploader::default();
        let batch = vec![daily(1, 2.5, 90, 0), daily(2, 1.25, 0, 30)];

        assert_eq!(run(&DeviceStatusProcessor, &batch, &store, &uploader).unwrap(), 1);

        let batches = uploader.batches.borrow();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].0, UploadKind::DeviceStatus);
        let status = &batches[0].1[0];
        // Battery from the older record, IOB from the newest.
        assert_eq!(status["pump"]["battery"]["percent"], 90);
        assert_eq!(status["pump"]["iob"]["iob"], 1.25);
        assert_eq!(status["pump"]["status"]["status"], "normal");
        assert_eq!(status["pumpId"], "2");
        assert_eq!(status["created_at"], "2024-05-01T10:30:00.000Z");
    }

    #[test]
    fn test_nothing_reported_uploads_nothing() {
        let store = SqliteStorage::open_memory().unwrap();
        let uploader = RecordingUploader::default();
        let batch = vec![daily(1, -1.0, 0, 0)];

        assert_eq!(run(&DeviceStatusProcessor, &batch, &store, &uploader).unwrap(), 0);
        assert!(uploader.batches.borrow().is_empty());
    }

    #[test]
    fn test_battery_byte_is_optional() {
        let store = SqliteStorage::open_memory().unwrap();
        let uploader = RecordingUploader::default();
        let payload = Bytes::default().f32(10.0).f32(0.5).f32(0.75).done();

        run(
            &DeviceStatusProcessor,
            &[entry_at(4, DAILY_BASAL, payload, 0)],
            &store,
            &uploader,
        )
        .unwrap();
        let status = &uploader.all()[0];
        assert_eq!(status["pump"]["iob"]["iob"], 0.75);
        assert!(status["pump"].get("battery").is_none());
    }
}
