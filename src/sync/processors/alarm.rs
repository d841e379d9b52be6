//! Pump alarms and alerts → `Announcement` treatments.

use super::payload::PayloadReader;
use super::{translate_each, upload_treatments, ProcessContext, Processor};
use crate::error::Result;
use crate::model::type_ids::{ALARM_ACTIVATED, ALARM_CLEARED, ALERT_ACTIVATED, ALERT_CLEARED};
use crate::model::{LogEntry, ProcessorCategory};
use crate::nightscout::Treatment;

pub struct AlarmProcessor;

/// `(kind, transition)` wording for a type id.
fn describe(type_id: u32) -> Option<(&'static str, &'static str)> {
    match type_id {
        ALARM_ACTIVATED => Some(("alarm", "activated")),
        ALARM_CLEARED => Some(("alarm", "cleared")),
        ALERT_ACTIVATED => Some(("alert", "activated")),
        ALERT_CLEARED => Some(("alert", "cleared")),
        _ => None,
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    chars
        .next()
        .map(|c| c.to_uppercase().chain(chars).collect())
        .unwrap_or_default()
}

impl Processor for AlarmProcessor {
    fn category(&self) -> ProcessorCategory {
        ProcessorCategory::Alarm
    }

    fn process(&self, entries: &[LogEntry], ctx: &ProcessContext<'_>) -> Result<usize> {
        let treatments = translate_each(self.category(), entries, |entry| {
            let Some((kind, transition)) = describe(entry.type_id) else {
                return Ok(None);
            };
            let id = PayloadReader::new(entry).u32(0)?;

            Ok(Some(
                Treatment::new("Announcement", entry.device_time, entry.seq_id)
                    .with_reason(format!("{} {transition}: ID {id}", capitalize(kind)))
                    .with_notes(format!("Pump {kind} {transition}, ID: {id}")),
            ))
        });
        upload_treatments(self.category(), &treatments, ctx)
    }
}
