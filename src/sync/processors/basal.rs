//! Basal delivery, rate changes and temp rates → `Temp Basal` treatments.

use super::payload::{milli_to_units, round3, PayloadReader};
use super::{translate_each, upload_treatments, ProcessContext, Processor};
use crate::error::Result;
use crate::model::type_ids::{BASAL_DELIVERY, BASAL_RATE_CHANGE, TEMP_RATE_ACTIVATED};
use crate::model::{LogEntry, ProcessorCategory};
use crate::nightscout::Treatment;

pub struct BasalProcessor;

const EVENT_TYPE: &str = "Temp Basal";

fn basal_delivery(entry: &LogEntry) -> Result<Treatment> {
    let r = PayloadReader::new(entry);
    r.require(16)?;
    let commanded = milli_to_units(r.u32(0)?);
    let profile = milli_to_units(r.u32(4)?);
    let algorithm = milli_to_units(r.u32(8)?);
    let temp = milli_to_units(r.u32(12)?);

    Ok(Treatment::new(EVENT_TYPE, entry.device_time, entry.seq_id)
        .with_rate(round3(commanded))
        .with_notes(format!(
            "Basal delivery: {commanded} U/hr (profile: {profile}, algorithm: {algorithm}, temp: {temp})"
        )))
}

fn rate_change(entry: &LogEntry) -> Result<Treatment> {
    let r = PayloadReader::new(entry);
    r.require(10)?;
    let command = round3(f64::from(r.f32(0)?));
    let base = round3(f64::from(r.f32(4)?));
    let change_type = r.u16(8)?;

    Ok(Treatment::new(EVENT_TYPE, entry.device_time, entry.seq_id)
        .with_rate(command)
        .with_notes(format!(
            "Basal rate change: {command} U/hr (base: {base} U/hr, change type: {change_type})"
        )))
}

fn temp_rate(entry: &LogEntry) -> Result<Treatment> {
    let r = PayloadReader::new(entry);
    r.require(8)?;
    let percent = round3(f64::from(r.f32(0)?));
    let hours = round3(f64::from(r.f32(4)?));

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let minutes = (hours * 60.0).round().max(0.0) as u32;

    Ok(Treatment::new(EVENT_TYPE, entry.device_time, entry.seq_id)
        .with_duration(Some(minutes))
        .with_notes(format!("Temp basal {percent}% for {hours}hr")))
}

impl Processor for BasalProcessor {
    fn category(&self) -> ProcessorCategory {
        ProcessorCategory::Basal
    }

    fn process(&self, entries: &[LogEntry], ctx: &ProcessContext<'_>) -> Result<usize> {
        let treatments = translate_each(self.category(), entries, |entry| {
            Ok(match entry.type_id {
                BASAL_DELIVERY => Some(basal_delivery(entry)?),
                BASAL_RATE_CHANGE => Some(rate_change(entry)?),
                TEMP_RATE_ACTIVATED => Some(temp_rate(entry)?),
                _ => None,
            })
        });
        upload_treatments(self.category(), &treatments, ctx)
    }
}
