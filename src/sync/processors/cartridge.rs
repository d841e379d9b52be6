//! Cartridge, tubing and cannula fills → `Insulin Change` / `Site Change`.

use super::payload::{round3, PayloadReader};
use super::{translate_each, upload_treatments, ProcessContext, Processor};
use crate::error::Result;
use crate::model::type_ids::{CANNULA_FILLED, CARTRIDGE_FILLED, TUBING_FILLED};
use crate::model::{LogEntry, ProcessorCategory};
use crate::nightscout::Treatment;

pub struct CartridgeProcessor;

fn cartridge_filled(entry: &LogEntry) -> Result<Treatment> {
    let r = PayloadReader::new(entry);
    r.require(8)?;
    let displayed = r.u32(0)?;
    let actual = round3(f64::from(r.f32(4)?));

    Ok(Treatment::new("Insulin Change", entry.device_time, entry.seq_id).with_notes(format!(
        "Cartridge filled with {displayed}U (actual: {actual}U)"
    )))
}

fn primed(entry: &LogEntry, what: &str) -> Result<Treatment> {
    let prime = round3(f64::from(PayloadReader::new(entry).f32(0)?));

    Ok(Treatment::new("Site Change", entry.device_time, entry.seq_id)
        .with_notes(format!("{what} filled/primed with {prime}U")))
}

impl Processor for CartridgeProcessor {
    fn category(&self) -> ProcessorCategory {
        ProcessorCategory::Cartridge
    }

    fn process(&self, entries: &[LogEntry], ctx: &ProcessContext<'_>) -> Result<usize> {
        let treatments = translate_each(self.category(), entries, |entry| {
            Ok(match entry.type_id {
                CARTRIDGE_FILLED => Some(cartridge_filled(entry)?),
                TUBING_FILLED => Some(primed(entry, "Tubing")?),
                CANNULA_FILLED => Some(primed(entry, "Cannula")?),
                _ => None,
            })
        });
        upload_treatments(self.category(), &treatments, ctx)
    }
}
