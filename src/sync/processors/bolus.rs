//! Bolus deliveries and extended boluses → `Bolus` treatments.

use super::payload::{milli_to_units, round3, PayloadReader};
use super::{translate_each, upload_treatments, ProcessContext, Processor};
use crate::error::Result;
use crate::model::type_ids::{BOLUS_DELIVERY, EXTENDED_BOLUS};
use crate::model::{LogEntry, ProcessorCategory};
use crate::nightscout::Treatment;

pub struct BolusProcessor;

/// Completed bolus: id, status, type mask and delivered total.
struct BolusDelivery {
    bolus_id: u16,
    bolus_type: u8,
    delivered_milli: u32,
    carbs: Option<u16>,
}

impl BolusDelivery {
    fn decode(entry: &LogEntry) -> Result<Self> {
        let r = PayloadReader::new(entry);
        r.require(8)?;
        Ok(Self {
            bolus_id: r.u16(0)?,
            bolus_type: r.u8(3)?,
            delivered_milli: r.u32(4)?,
            carbs: r.opt_u16(8),
        })
    }

    fn into_treatment(self, entry: &LogEntry) -> Treatment {
        Treatment::new("Bolus", entry.device_time, entry.seq_id)
            .with_insulin(Some(round3(milli_to_units(self.delivered_milli))))
            .with_carbs(self.carbs.filter(|c| *c > 0).map(f64::from))
            .with_notes(format!(
                "Bolus delivery, ID: {}, type: {}",
                self.bolus_id, self.bolus_type
            ))
    }
}

/// Extended portion of a combo bolus.
struct ExtendedBolus {
    bolus_id: u16,
    extended_milli: u32,
    duration_minutes: u32,
}

impl ExtendedBolus {
    fn decode(entry: &LogEntry) -> Result<Self> {
        let r = PayloadReader::new(entry);
        r.require(10)?;
        Ok(Self {
            bolus_id: r.u16(0)?,
            extended_milli: r.u32(2)?,
            duration_minutes: r.u32(6)?,
        })
    }

    fn into_treatment(self, entry: &LogEntry) -> Treatment {
        Treatment::new("Bolus", entry.device_time, entry.seq_id)
            .with_relative(Some(round3(milli_to_units(self.extended_milli))))
            .with_duration(Some(self.duration_minutes))
            .with_notes(format!("Extended Bolus (ID: {})", self.bolus_id))
    }
}

impl Processor for BolusProcessor {
    fn category(&self) -> ProcessorCategory {
        ProcessorCategory::Bolus
    }

    fn process(&self, entries: &[LogEntry], ctx: &ProcessContext<'_>) -> Result<usize> {
        let treatments = translate_each(self.category(), entries, |entry| {
            Ok(match entry.type_id {
                BOLUS_DELIVERY => Some(BolusDelivery::decode(entry)?.into_treatment(entry)),
                EXTENDED_BOLUS => Some(ExtendedBolus::decode(entry)?.into_treatment(entry)),
                _ => None,
            })
        });
        upload_treatments(self.category(), &treatments, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStorage;
    use crate::sync::processors::testing::{entry_at, run, Bytes, RecordingUploader};
    use crate::sync::UploadKind;

    fn delivery(seq_id: u64, id: u16, milli: u32, carbs: Option<u16>) -> LogEntry {
        let mut b = Bytes::default().u16(id).u8(0).u8(1).u32(milli);
        if let Some(c) = carbs {
            b = b.u16(c);
        }
        entry_at(seq_id, BOLUS_DELIVERY, b.done(), 0)
    }

    #[test]
    fn test_bolus_delivery_treatment() {
        let store = SqliteStorage::open_memory().unwrap();
        let uploader = RecordingUploader::default();

        let uploaded = run(
            &BolusProcessor,
            &[delivery(10, 42, 2500, Some(30))],
            &store,
            &uploader,
        )
        .unwrap();
        assert_eq!(uploaded, 1);

        let batches = uploader.batches.borrow();
        assert_eq!(batches[0].0, UploadKind::Treatments);
        let t = &batches[0].1[0];
        assert_eq!(t["eventType"], "Bolus");
        assert_eq!(t["insulin"], 2.5);
        assert_eq!(t["carbs"], 30.0);
        assert_eq!(t["notes"], "Bolus delivery, ID: 42, type: 1");
        assert_eq!(t["pumpId"], "10");
    }

    #[test]
    fn test_bolus_without_carbs_omits_field() {
        let store = SqliteStorage::open_memory().unwrap();
        let uploader = RecordingUploader::default();

        run(&BolusProcessor, &[delivery(1, 1, 100, None)], &store, &uploader).unwrap();
        let t = &uploader.all()[0];
        assert_eq!(t["insulin"], 0.1);
        assert!(t.get("carbs").is_none());
    }

    #[test]
    fn test_extended_bolus_treatment() {
        let store = SqliteStorage::open_memory().unwrap();
        let uploader = RecordingUploader::default();
        let payload = Bytes::default().u16(7).u32(1500).u32(120).done();

        run(
            &BolusProcessor,
            &[entry_at(3, EXTENDED_BOLUS, payload, 0)],
            &store,
            &uploader,
        )
        .unwrap();
        let t = &uploader.all()[0];
        assert_eq!(t["relative"], 1.5);
        assert_eq!(t["duration"], 120);
        assert_eq!(t["notes"], "Extended Bolus (ID: 7)");
        assert!(t.get("insulin").is_none());
    }

    #[test]
    fn test_short_payload_is_skipped() {
        let store = SqliteStorage::open_memory().unwrap();
        let uploader = RecordingUploader::default();
        let batch = vec![
            entry_at(1, BOLUS_DELIVERY, vec![0; 4], 0),
            delivery(2, 5, 1000, None),
        ];

        assert_eq!(run(&BolusProcessor, &batch, &store, &uploader).unwrap(), 1);
        assert_eq!(uploader.all()[0]["pumpId"], "2");
    }
}
