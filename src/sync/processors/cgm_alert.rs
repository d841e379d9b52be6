//! CGM alerts (generic, Dexcom, FreeStyle Libre 2) → `Announcement` treatments.

use super::payload::PayloadReader;
use super::{translate_each, upload_treatments, ProcessContext, Processor};
use crate::error::Result;
use crate::model::type_ids::{
    CGM_ALERT_ACTIVATED, CGM_ALERT_ACTIVATED_DEX, CGM_ALERT_ACTIVATED_FSL2, CGM_ALERT_CLEARED,
    CGM_ALERT_CLEARED_DEX, CGM_ALERT_CLEARED_FSL2,
};
use crate::model::{LogEntry, ProcessorCategory};
use crate::nightscout::Treatment;

pub struct CgmAlertProcessor;

/// Sensor family prefix and whether the record clears the alert.
fn describe(type_id: u32) -> Option<(&'static str, bool)> {
    match type_id {
        CGM_ALERT_ACTIVATED => Some(("CGM", false)),
        CGM_ALERT_CLEARED => Some(("CGM", true)),
        CGM_ALERT_ACTIVATED_DEX => Some(("Dexcom", false)),
        CGM_ALERT_CLEARED_DEX => Some(("Dexcom", true)),
        CGM_ALERT_ACTIVATED_FSL2 => Some(("FreeStyle Libre", false)),
        CGM_ALERT_CLEARED_FSL2 => Some(("FreeStyle Libre", true)),
        _ => None,
    }
}

impl Processor for CgmAlertProcessor {
    fn category(&self) -> ProcessorCategory {
        ProcessorCategory::CgmAlert
    }

    fn process(&self, entries: &[LogEntry], ctx: &ProcessContext<'_>) -> Result<usize> {
        let treatments = translate_each(self.category(), entries, |entry| {
            let Some((family, cleared)) = describe(entry.type_id) else {
                return Ok(None);
            };
            let id = PayloadReader::new(entry).u16(0)?;

            let (reason, notes) = if cleared {
                (
                    format!("{family} Alert Cleared (ID: {id})"),
                    format!("CGM alert cleared, ID: {id}"),
                )
            } else {
                (
                    format!("{family} Alert (ID: {id})"),
                    format!("CGM alert activated, ID: {id}"),
                )
            };

            Ok(Some(
                Treatment::new("Announcement", entry.device_time, entry.seq_id)
                    .with_reason(reason)
                    .with_notes(notes),
            ))
        });
        upload_treatments(self.category(), &treatments, ctx)
    }
}
