//! Control-IQ mode changes → `Exercise` or `Note` treatments.

use super::payload::PayloadReader;
use super::{translate_each, upload_treatments, ProcessContext, Processor};
use crate::error::Result;
use crate::model::type_ids::CONTROL_IQ_USER_MODE_CHANGE;
use crate::model::{LogEntry, ProcessorCategory};
use crate::nightscout::Treatment;

pub struct UserModeProcessor;

const EXERCISE_MODE: u8 = 2;

fn mode_name(mode: u8) -> String {
    match mode {
        0 => "Standard".to_string(),
        1 => "Sleep".to_string(),
        EXERCISE_MODE => "Exercise".to_string(),
        other => format!("Mode {other}"),
    }
}

fn mode_change(entry: &LogEntry) -> Result<Treatment> {
    let r = PayloadReader::new(entry);
    r.require(2)?;
    let current = r.u8(0)?;
    let previous = r.u8(1)?;

    let event_type = if current == EXERCISE_MODE {
        "Exercise"
    } else {
        "Note"
    };

    Ok(Treatment::new(event_type, entry.device_time, entry.seq_id)
        .with_reason(format!("Control-IQ mode changed to {}", mode_name(current)))
        .with_notes(format!(
            "Control-IQ mode changed from {} to {}",
            mode_name(previous),
            mode_name(current)
        )))
}

impl Processor for UserModeProcessor {
    fn category(&self) -> ProcessorCategory {
        ProcessorCategory::UserMode
    }

    fn process(&self, entries: &[LogEntry], ctx: &ProcessContext<'_>) -> Result<usize> {
        let treatments = translate_each(self.category(), entries, |entry| {
            if entry.type_id == CONTROL_IQ_USER_MODE_CHANGE {
                mode_change(entry).map(Some)
            } else {
                Ok(None)
            }
        });
        upload_treatments(self.category(), &treatments, ctx)
    }
}
