//! Delivery resumptions → `Note` treatments.

use super::payload::{milli_to_units, round3, PayloadReader};
use super::{translate_each, upload_treatments, ProcessContext, Processor};
use crate::error::Result;
use crate::model::type_ids::{HYPO_MINIMIZER_RESUME, PUMPING_RESUMED};
use crate::model::{LogEntry, ProcessorCategory};
use crate::nightscout::Treatment;

pub struct BasalResumeProcessor;

fn pumping_resumed(entry: &LogEntry) -> Result<Treatment> {
    let r = PayloadReader::new(entry);
    let iob = round3(milli_to_units(r.u32(0)?));

    Ok(Treatment::new("Note", entry.device_time, entry.seq_id)
        .with_reason("Pumping resumed")
        .with_notes(format!("Pumping resumed, IOB: {iob}U")))
}

fn hypo_minimizer_resume(entry: &LogEntry) -> Result<Treatment> {
    let reason = PayloadReader::new(entry).u8(0)?;

    Ok(Treatment::new("Note", entry.device_time, entry.seq_id)
        .with_reason("Hypo Minimizer resume")
        .with_notes(format!("Hypo Minimizer resume, reason code: {reason}")))
}

impl Processor for BasalResumeProcessor {
    fn category(&self) -> ProcessorCategory {
        ProcessorCategory::BasalResume
    }

    fn process(&self, entries: &[LogEntry], ctx: &ProcessContext<'_>) -> Result<usize> {
        let treatments = translate_each(self.category(), entries, |entry| {
            Ok(match entry.type_id {
                PUMPING_RESUMED => Some(pumping_resumed(entry)?),
                HYPO_MINIMIZER_RESUME => Some(hypo_minimizer_resume(entry)?),
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

    #[test]
    fn test_resume_notes() {
        let store = SqliteStorage::open_memory().unwrap();
        let uploader = RecordingUploader::default();
        let batch = vec![
            entry_at(1, PUMPING_RESUMED, Bytes::default().u32(500).done(), 0),
            entry_at(2, HYPO_MINIMIZER_RESUME, vec![3], 5),
        ];

        assert_eq!(run(&BasalResumeProcessor, &batch, &store, &uploader).unwrap(), 2);
        let sent = uploader.all();
        assert_eq!(sent[0]["eventType"], "Note");
        assert_eq!(sent[0]["reason"], "Pumping resumed");
        assert_eq!(sent[0]["notes"], "Pumping resumed, IOB: 0.5U");
        assert_eq!(sent[1]["reason"], "Hypo Minimizer resume");
        assert!(sent[1].get("rate").is_none());
    }
}
