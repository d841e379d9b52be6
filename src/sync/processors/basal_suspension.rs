//! Delivery suspensions → zero-rate `Temp Basal` treatments.

use super::payload::{milli_to_units, round3, PayloadReader};
use super::{translate_each, upload_treatments, ProcessContext, Processor};
use crate::error::Result;
use crate::model::type_ids::{HYPO_MINIMIZER_SUSPEND, PUMPING_SUSPENDED};
use crate::model::{LogEntry, ProcessorCategory};
use crate::nightscout::Treatment;

pub struct BasalSuspensionProcessor;

fn pumping_suspended(entry: &LogEntry) -> Result<Treatment> {
    let r = PayloadReader::new(entry);
    r.require(5)?;
    let iob = round3(milli_to_units(r.u32(0)?));
    let reason = r.u8(4)?;

    Ok(Treatment::new("Temp Basal", entry.device_time, entry.seq_id)
        .with_rate(0.0)
        .with_reason(format!("Pumping suspended (reason: {reason})"))
        .with_notes(format!("Pumping suspended, IOB: {iob}U, reason code: {reason}")))
}

fn hypo_minimizer_suspend(entry: &LogEntry) -> Treatment {
    Treatment::new("Temp Basal", entry.device_time, entry.seq_id)
        .with_rate(0.0)
        .with_reason("Hypo Minimizer suspend")
        .with_notes("Hypo Minimizer suspend")
}

impl Processor for BasalSuspensionProcessor {
    fn category(&self) -> ProcessorCategory {
        ProcessorCategory::BasalSuspension
    }

    fn process(&self, entries: &[LogEntry], ctx: &ProcessContext<'_>) -> Result<usize> {
        let treatments = translate_each(self.category(), entries, |entry| {
            Ok(match entry.type_id {
                PUMPING_SUSPENDED => Some(pumping_suspended(entry)?),
                HYPO_MINIMIZER_SUSPEND => Some(hypo_minimizer_suspend(entry)),
                _ => None,
            })
        });
        upload_treatments(self.category(), &treatments, ctx)
    }
}
