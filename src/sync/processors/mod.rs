//! Category processors.
//!
//! Each processor owns the type ids of one [`ProcessorCategory`] and turns
//! matching log entries into Nightscout records. Payloads are decoded into
//! small typed views with [`payload::PayloadReader`]; an entry that fails to
//! decode is logged and skipped without failing the batch.
//!
//! The coordinator drives processors in [`registry`] order.

mod alarm;
mod basal;
mod basal_resume;
mod basal_suspension;
mod bolus;
mod cartridge;
mod cgm_alert;
mod cgm_reading;
mod device_status;
pub mod payload;
mod user_mode;

pub use alarm::AlarmProcessor;
pub use basal::BasalProcessor;
pub use basal_resume::BasalResumeProcessor;
pub use basal_suspension::BasalSuspensionProcessor;
pub use bolus::BolusProcessor;
pub use cartridge::CartridgeProcessor;
pub use cgm_alert::CgmAlertProcessor;
pub use cgm_reading::CgmReadingProcessor;
pub use device_status::DeviceStatusProcessor;
pub use user_mode::UserModeProcessor;

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::SyncConfig;
use crate::error::Result;
use crate::model::{LogEntry, ProcessorCategory};
use crate::nightscout::Treatment;
use crate::sync::{LogStore, RemoteUploader, UploadKind};

/// Everything a processor may touch while handling one batch.
pub struct ProcessContext<'a> {
    pub config: &'a SyncConfig,
    pub uploader: &'a dyn RemoteUploader,
    /// Read access to the local log, e.g. for trend seeding.
    pub store: &'a dyn LogStore,
    pub device_id: u32,
}

/// Translator for one category.
pub trait Processor {
    /// The category this processor handles.
    fn category(&self) -> ProcessorCategory;

    /// Whether the configuration asks for this category.
    fn is_enabled(&self, config: &SyncConfig) -> bool {
        config.is_category_enabled(self.category())
    }

    /// Type ids this processor accepts. Fixed per category.
    fn supported_type_ids(&self) -> &'static [u32] {
        self.category().type_ids()
    }

    /// Translate and upload `entries`, which are already filtered to
    /// [`Self::supported_type_ids`] and sorted by sequence id.
    ///
    /// Returns the number of records the remote accepted.
    ///
    /// # Errors
    ///
    /// Returns an error when the upload fails.
    fn process(&self, entries: &[LogEntry], ctx: &ProcessContext<'_>) -> Result<usize>;
}

/// One processor per category, in dispatch priority order.
#[must_use]
pub fn registry() -> Vec<Box<dyn Processor>> {
    vec![
        Box::new(CgmReadingProcessor),
        Box::new(BolusProcessor),
        Box::new(BasalProcessor),
        Box::new(BasalSuspensionProcessor),
        Box::new(BasalResumeProcessor),
        Box::new(AlarmProcessor),
        Box::new(CgmAlertProcessor),
        Box::new(UserModeProcessor),
        Box::new(CartridgeProcessor),
        Box::new(DeviceStatusProcessor),
    ]
}

/// Run `translate` over every entry, dropping entries that fail to decode
/// (warned) or that the translator declines with `Ok(None)`.
pub(crate) fn translate_each<T>(
    category: ProcessorCategory,
    entries: &[LogEntry],
    mut translate: impl FnMut(&LogEntry) -> Result<Option<T>>,
) -> Vec<T> {
    let mut out = Vec::with_capacity(entries.len());
    for entry in entries {
        match translate(entry) {
            Ok(Some(record)) => out.push(record),
            Ok(None) => {
                debug!(
                    category = %category,
                    seq_id = entry.seq_id,
                    type_id = entry.type_id,
                    "Entry produced no record, skipping"
                );
            }
            Err(e) => {
                warn!(category = %category, seq_id = entry.seq_id, error = %e, "Failed to convert entry");
            }
        }
    }
    out
}

/// Serialize `records` and post them to `kind`. Empty batches are not sent.
///
/// # Errors
///
/// Returns an error if serialization or the upload fails.
pub(crate) fn upload<T: Serialize>(
    category: ProcessorCategory,
    kind: UploadKind,
    records: &[T],
    uploader: &dyn RemoteUploader,
) -> Result<usize> {
    if records.is_empty() {
        debug!(category = %category, "No records to upload");
        return Ok(0);
    }

    let payloads = records
        .iter()
        .map(serde_json::to_value)
        .collect::<serde_json::Result<Vec<_>>>()?;

    let uploaded = uploader.upload_batch(kind, &payloads)?;
    debug!(category = %category, uploaded, "Uploaded records");
    Ok(uploaded)
}

/// Shorthand for the treatment-producing categories.
pub(crate) fn upload_treatments(
    category: ProcessorCategory,
    treatments: &[Treatment],
    ctx: &ProcessContext<'_>,
) -> Result<usize> {
    upload(category, UploadKind::Treatments, treatments, ctx.uploader)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_follows_priority_order() {
        let categories: Vec<ProcessorCategory> =
            registry().iter().map(|p| p.category()).collect();
        assert_eq!(categories, ProcessorCategory::ALL.to_vec());
    }

    #[test]
    fn test_default_enablement_follows_config() {
        let mut config = SyncConfig::default();
        config.enabled_categories.remove(&ProcessorCategory::Alarm);
        for processor in registry() {
            assert_eq!(
                processor.is_enabled(&config),
                processor.category() != ProcessorCategory::Alarm
            );
            assert_eq!(
                processor.supported_type_ids(),
                processor.category().type_ids()
            );
        }
    }
}
