//! CGM readings → Nightscout `sgv` entries with a computed trend arrow.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use tracing::warn;

use super::payload::PayloadReader;
use super::{translate_each, upload, ProcessContext, Processor};
use crate::error::Result;
use crate::model::{LogEntry, ProcessorCategory};
use crate::nightscout::Entry;
use crate::sync::UploadKind;

/// Prior stored readings used to seed the trend window.
const SEED_READINGS: usize = 4;
/// Readings older than this (relative to the newest) fall out of the window.
const WINDOW_MINUTES: i64 = 16;
/// Minimum window span before a direction is reported.
const MIN_SPAN_MINUTES: i64 = 8;

/// Glucose display value at offset 6 (u16, mg/dL). Shared by the G6 and G7
/// record layouts.
const SGV_OFFSET: usize = 6;

pub struct CgmReadingProcessor;

#[derive(Debug, Clone, Copy)]
struct ReadingPoint {
    time: DateTime<Utc>,
    sgv: i32,
}

fn decode_sgv(entry: &LogEntry) -> Result<i32> {
    let reader = PayloadReader::new(entry);
    Ok(i32::from(reader.u16(SGV_OFFSET)?))
}

/// Nightscout direction name for a slope in mg/dL per minute.
#[must_use]
pub fn slope_to_direction(slope: f64) -> &'static str {
    match slope {
        s if s > 3.0 => "DoubleUp",
        s if s > 2.0 => "SingleUp",
        s if s > 1.0 => "FortyFiveUp",
        s if s > -1.0 => "Flat",
        s if s > -2.0 => "FortyFiveDown",
        s if s > -3.0 => "SingleDown",
        _ => "DoubleDown",
    }
}

fn trend(window: &VecDeque<ReadingPoint>) -> Option<&'static str> {
    if window.len() < 2 {
        return None;
    }
    let first = window.front()?;
    let last = window.back()?;

    let span = (last.time - first.time).num_minutes();
    if span < MIN_SPAN_MINUTES {
        return None;
    }

    #[allow(clippy::cast_precision_loss)]
    let slope = f64::from(last.sgv - first.sgv) / span as f64;
    Some(slope_to_direction(slope))
}

impl Processor for CgmReadingProcessor {
    fn category(&self) -> ProcessorCategory {
        ProcessorCategory::CgmReading
    }

    fn process(&self, entries: &[LogEntry], ctx: &ProcessContext<'_>) -> Result<usize> {
        let Some(first) = entries.first() else {
            return Ok(0);
        };

        let mut window: VecDeque<ReadingPoint> = VecDeque::new();
        match ctx.store.recent_of_types(
            ctx.device_id,
            self.supported_type_ids(),
            first.seq_id,
            SEED_READINGS,
        ) {
            Ok(prior) => {
                for item in &prior {
                    if let Ok(sgv) = decode_sgv(item) {
                        if sgv > 0 {
                            window.push_back(ReadingPoint {
                                time: item.device_time,
                                sgv,
                            });
                        }
                    }
                }
            }
            Err(e) => warn!(error = %e, "Could not seed CGM trend window"),
        }

        let records = translate_each(self.category(), entries, |entry| {
            let sgv = decode_sgv(entry)?;
            if sgv <= 0 {
                return Ok(None);
            }

            let point = ReadingPoint {
                time: entry.device_time,
                sgv,
            };
            window.push_back(point);
            while window
                .front()
                .is_some_and(|p| (point.time - p.time).num_minutes() > WINDOW_MINUTES)
            {
                window.pop_front();
            }

            Ok(Some(Entry::sgv(
                entry.device_time,
                sgv,
                trend(&window),
                entry.seq_id,
            )))
        });

        upload(self.category(), UploadKind::Entries, &records, ctx.uploader)
    }
}
