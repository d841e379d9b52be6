//! One synchronization pass from the cursor to the remote.

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::model::{LogEntry, SyncCursor};
use crate::sync::processors::{registry, ProcessContext, Processor};
use crate::sync::{CursorStore, LogStore, RemoteUploader, SyncResult};

/// Orchestrates a pass: range selection, ordered dispatch, cursor commit.
///
/// Not reentrant. Callers that drive passes from more than one place should
/// go through [`crate::sync::SyncScheduler`], which serializes them.
pub struct SyncCoordinator<'a> {
    store: &'a dyn LogStore,
    cursors: &'a dyn CursorStore,
    uploader: &'a dyn RemoteUploader,
    config: &'a SyncConfig,
    device_id: u32,
    processors: Vec<Box<dyn Processor>>,
}

impl<'a> SyncCoordinator<'a> {
    /// Coordinator using the standard processor registry.
    #[must_use]
    pub fn new(
        store: &'a dyn LogStore,
        cursors: &'a dyn CursorStore,
        uploader: &'a dyn RemoteUploader,
        config: &'a SyncConfig,
        device_id: u32,
    ) -> Self {
        Self {
            store,
            cursors,
            uploader,
            config,
            device_id,
            processors: registry(),
        }
    }

    /// Replace the processor list. The list is dispatched in the given order.
    #[must_use]
    pub fn with_processors(mut self, processors: Vec<Box<dyn Processor>>) -> Self {
        self.processors = processors;
        self
    }

    /// Run one pass now.
    ///
    /// # Errors
    ///
    /// Returns an error only if the cursor or the log cannot be read or
    /// written. Processor failures are logged and never surface here.
    pub fn sync_all(&self) -> Result<SyncResult> {
        self.sync_all_at(Utc::now())
    }

    /// Run one pass as if the current time were `now`.
    ///
    /// # Errors
    ///
    /// See [`Self::sync_all`].
    pub fn sync_all_at(&self, now: DateTime<Utc>) -> Result<SyncResult> {
        if !self.config.enabled {
            debug!("Sync is disabled");
            return Ok(SyncResult::Disabled);
        }
        if !self.config.is_valid() {
            warn!("Sync is enabled but the remote URL or secret is missing");
            return Ok(SyncResult::InvalidConfig);
        }

        let cursor = self.ensure_cursor(now)?;
        let retroactive = cursor.retroactive_range().is_some();
        let (start, end) = self.determine_range(&cursor, now)?;

        let entries = if start > end {
            Vec::new()
        } else {
            self.store.range(self.device_id, start, end)?
        };
        let Some(last) = entries.iter().map(|e| e.seq_id).max() else {
            debug!(start, end, "Nothing new to sync");
            if retroactive {
                // An empty window must not pin every later pass.
                self.cursors.set_retroactive_range(None, None)?;
            }
            return Ok(SyncResult::NoData);
        };

        info!(
            device_id = self.device_id,
            start,
            end = last,
            count = entries.len(),
            retroactive,
            "Starting sync pass"
        );

        let uploaded = self.dispatch(&entries);

        // Never rewind: a retroactive window over old entries keeps the
        // incremental position.
        let committed = last.max(cursor.last_processed_seq_id);
        self.cursors.update_last_processed(committed, now)?;
        if retroactive {
            self.cursors.set_retroactive_range(None, None)?;
            info!("Retroactive sync complete");
        }

        info!(
            processed = entries.len(),
            uploaded,
            last_seq_id = committed,
            "Sync pass complete"
        );

        Ok(SyncResult::Success {
            processed_count: entries.len(),
            uploaded_count: uploaded,
            seq_id_range: (start, last),
        })
    }

    /// Request a one-off pass over `[start, end]` device time and run it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `start` is after `end`, or a
    /// store error as for [`Self::sync_all`].
    pub fn sync_retroactive(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<SyncResult> {
        self.request_retroactive(start, end)?;
        self.sync_all()
    }

    /// Record a retroactive window for the next pass without running it.
    ///
    /// # Errors
    ///
    /// See [`Self::sync_retroactive`].
    pub fn request_retroactive(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<()> {
        if start > end {
            return Err(Error::InvalidArgument(format!(
                "Retroactive start {start} is after end {end}"
            )));
        }

        self.ensure_cursor(Utc::now())?;
        self.cursors.set_retroactive_range(Some(start), Some(end))?;
        info!(%start, %end, "Retroactive sync requested");
        Ok(())
    }

    fn ensure_cursor(&self, now: DateTime<Utc>) -> Result<SyncCursor> {
        if let Some(cursor) = self.cursors.get()? {
            return Ok(cursor);
        }

        let cursor = SyncCursor::bootstrap(now, self.config.initial_lookback_hours);
        self.cursors.upsert(&cursor)?;
        info!(
            lookback_hours = cursor.lookback_hours,
            "Created sync cursor"
        );
        Ok(cursor)
    }

    /// Inclusive `(start, end)` sequence range for this pass. `start > end`
    /// means there is nothing to do.
    fn determine_range(&self, cursor: &SyncCursor, now: DateTime<Utc>) -> Result<(u64, u64)> {
        if let Some((retro_start, retro_end)) = cursor.retroactive_range() {
            let all = self.store.all(self.device_id)?;
            let start = all
                .iter()
                .find(|e| e.device_time >= retro_start)
                .map_or(0, |e| e.seq_id);
            let end = all
                .iter()
                .rev()
                .find(|e| e.device_time <= retro_end)
                .map_or(u64::MAX, |e| e.seq_id);
            debug!(start, end, "Using retroactive range");
            return Ok((start, end));
        }

        let end = self.latest_seq_id()?;

        if cursor.has_position() {
            let start = cursor.last_processed_seq_id.saturating_add(1);
            debug!(start, end, "Resuming from cursor");
            return Ok((start, end));
        }

        let lookback = cursor.lookback_time(now);
        let start = self
            .store
            .all(self.device_id)?
            .iter()
            .find(|e| e.device_time >= lookback)
            .map_or(0, |e| e.seq_id);
        debug!(start, end, %lookback, "First sync using lookback window");
        Ok((start, end))
    }

    fn latest_seq_id(&self) -> Result<u64> {
        Ok(self
            .store
            .latest(self.device_id)?
            .map_or(u64::MAX, |e| e.seq_id))
    }

    /// Push `entries` through every enabled processor in order. Returns the
    /// total number of uploaded records.
    fn dispatch(&self, entries: &[LogEntry]) -> usize {
        let ctx = ProcessContext {
            config: self.config,
            uploader: self.uploader,
            store: self.store,
            device_id: self.device_id,
        };

        let mut total = 0;
        for processor in &self.processors {
            let category = processor.category();
            if !processor.is_enabled(self.config) {
                debug!(category = %category, "Category disabled, skipping");
                continue;
            }

            let supported = processor.supported_type_ids();
            let mut matching: Vec<LogEntry> = entries
                .iter()
                .filter(|e| supported.contains(&e.type_id))
                .cloned()
                .collect();
            if matching.is_empty() {
                continue;
            }
            matching.sort_by_key(|e| e.seq_id);

            match processor.process(&matching, &ctx) {
                Ok(uploaded) => {
                    debug!(category = %category, entries = matching.len(), uploaded, "Category processed");
                    total += uploaded;
                }
                Err(e) => {
                    error!(category = %category, entries = matching.len(), error = %e, "Category failed");
                }
            }
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use chrono::Duration;

    use super::*;
    use crate::model::type_ids::{BOLUS_DELIVERY, DAILY_BASAL, DEXCOM_G6_CGM, PUMPING_SUSPENDED};
    use crate::model::ProcessorCategory;
    use crate::storage::SqliteStorage;
    use crate::sync::processors::testing::{base_time, Bytes, RecordingUploader};

    fn config() -> SyncConfig {
        SyncConfig {
            enabled: true,
            remote_url: "https://ns.example".into(),
            remote_secret: "secret".into(),
            ..SyncConfig::default()
        }
    }

    fn cgm(seq_id: u64, time: DateTime<Utc>) -> LogEntry {
        let payload = Bytes::default().u32(0).u16(0).u16(110).done();
        LogEntry::new(1, seq_id, DEXCOM_G6_CGM, payload, time)
    }

    fn seed(store: &SqliteStorage, entries: &[LogEntry]) {
        for e in entries {
            store.insert_if_absent(e).unwrap();
        }
    }

    /// Processor that records when it runs and optionally fails.
    struct ScriptedProcessor {
        category: ProcessorCategory,
        calls: Rc<RefCell<Vec<(ProcessorCategory, Vec<u64>)>>>,
        fail: bool,
    }

    impl Processor for ScriptedProcessor {
        fn category(&self) -> ProcessorCategory {
            self.category
        }

        fn process(&self, entries: &[LogEntry], _ctx: &ProcessContext<'_>) -> Result<usize> {
            self.calls
                .borrow_mut()
                .push((self.category, entries.iter().map(|e| e.seq_id).collect()));
            if self.fail {
                return Err(Error::Upload {
                    endpoint: "/api/v1/treatments".into(),
                    message: "500".into(),
                });
            }
            Ok(entries.len())
        }
    }

    type Calls = Rc<RefCell<Vec<(ProcessorCategory, Vec<u64>)>>>;

    fn scripted(failing: &[ProcessorCategory]) -> (Vec<Box<dyn Processor>>, Calls) {
        let calls: Calls = Rc::default();
        let list = ProcessorCategory::ALL
            .into_iter()
            .map(|category| {
                Box::new(ScriptedProcessor {
                    category,
                    calls: Rc::clone(&calls),
                    fail: failing.contains(&category),
                }) as Box<dyn Processor>
            })
            .collect();
        (list, calls)
    }

    #[test]
    fn test_disabled_leaves_cursor_untouched() {
        let store = SqliteStorage::open_memory().unwrap();
        seed(&store, &[cgm(1, base_time())]);
        let uploader = RecordingUploader::default();
        let config = SyncConfig {
            enabled: false,
            ..config()
        };

        let coordinator = SyncCoordinator::new(&store, &store, &uploader, &config, 1);
        assert_eq!(coordinator.sync_all_at(base_time()).unwrap(), SyncResult::Disabled);
        assert!(store.get().unwrap().is_none());
        assert!(uploader.batches.borrow().is_empty());
    }

    #[test]
    fn test_blank_remote_is_invalid_config() {
        let store = SqliteStorage::open_memory().unwrap();
        let uploader = RecordingUploader::default();
        for config in [
            SyncConfig {
                remote_url: "  ".into(),
                ..config()
            },
            SyncConfig {
                remote_secret: String::new(),
                ..config()
            },
        ] {
            let coordinator = SyncCoordinator::new(&store, &store, &uploader, &config, 1);
            assert_eq!(
                coordinator.sync_all_at(base_time()).unwrap(),
                SyncResult::InvalidConfig
            );
        }
        assert!(store.get().unwrap().is_none());
    }

    #[test]
    fn test_first_sync_respects_lookback() {
        let store = SqliteStorage::open_memory().unwrap();
        let now = base_time();
        seed(
            &store,
            &[
                cgm(1, now - Duration::hours(48)),
                cgm(2, now - Duration::hours(36)),
                cgm(3, now - Duration::hours(12)),
                cgm(4, now - Duration::hours(1)),
            ],
        );
        let uploader = RecordingUploader::default();
        let config = config();

        let coordinator = SyncCoordinator::new(&store, &store, &uploader, &config, 1);
        let result = coordinator.sync_all_at(now).unwrap();

        assert_eq!(
            result,
            SyncResult::Success {
                processed_count: 2,
                uploaded_count: 2,
                seq_id_range: (3, 4),
            }
        );
        let cursor = store.get().unwrap().unwrap();
        assert_eq!(cursor.last_processed_seq_id, 4);
        assert_eq!(cursor.last_processed_time, Some(now));
        assert_eq!(cursor.lookback_hours, 24);
        assert_eq!(uploader.all().len(), 2);
    }

    #[test]
    fn test_incremental_sync_and_no_data() {
        let store = SqliteStorage::open_memory().unwrap();
        let now = base_time();
        seed(&store, &[cgm(1, now - Duration::hours(2)), cgm(2, now - Duration::hours(1))]);
        let uploader = RecordingUploader::default();
        let config = config();
        let coordinator = SyncCoordinator::new(&store, &store, &uploader, &config, 1);

        coordinator.sync_all_at(now).unwrap();
        assert_eq!(coordinator.sync_all_at(now).unwrap(), SyncResult::NoData);

        seed(&store, &[cgm(3, now), cgm(4, now + Duration::minutes(5))]);
        let later = now + Duration::minutes(10);
        let result = coordinator.sync_all_at(later).unwrap();
        assert_eq!(
            result,
            SyncResult::Success {
                processed_count: 2,
                uploaded_count: 2,
                seq_id_range: (3, 4),
            }
        );
        assert_eq!(store.get().unwrap().unwrap().last_processed_seq_id, 4);
    }

    #[test]
    fn test_single_new_entry_is_processed() {
        let store = SqliteStorage::open_memory().unwrap();
        let now = base_time();
        seed(&store, &[cgm(1, now)]);
        let uploader = RecordingUploader::default();
        let config = config();
        let coordinator = SyncCoordinator::new(&store, &store, &uploader, &config, 1);

        coordinator.sync_all_at(now).unwrap();
        seed(&store, &[cgm(2, now + Duration::minutes(5))]);
        assert!(matches!(
            coordinator.sync_all_at(now + Duration::minutes(6)).unwrap(),
            SyncResult::Success { processed_count: 1, seq_id_range: (2, 2), .. }
        ));
    }

    #[test]
    fn test_empty_store_is_no_data() {
        let store = SqliteStorage::open_memory().unwrap();
        let uploader = RecordingUploader::default();
        let config = config();
        let coordinator = SyncCoordinator::new(&store, &store, &uploader, &config, 1);

        assert_eq!(coordinator.sync_all_at(base_time()).unwrap(), SyncResult::NoData);
        // The cursor is still bootstrapped.
        assert!(store.get().unwrap().is_some());
    }

    #[test]
    fn test_lookback_change_after_first_sync_is_ignored() {
        let store = SqliteStorage::open_memory().unwrap();
        let now = base_time();
        seed(&store, &[cgm(1, now - Duration::hours(1))]);
        let uploader = RecordingUploader::default();
        let config = config();
        SyncCoordinator::new(&store, &store, &uploader, &config, 1)
            .sync_all_at(now)
            .unwrap();

        seed(&store, &[cgm(2, now - Duration::hours(30))]);
        let wider = SyncConfig {
            initial_lookback_hours: 72,
            ..config.clone()
        };
        let result = SyncCoordinator::new(&store, &store, &uploader, &wider, 1)
            .sync_all_at(now)
            .unwrap();
        // Resumes after seq 1 and picks up seq 2, regardless of its old timestamp.
        assert!(matches!(result, SyncResult::Success { seq_id_range: (2, 2), .. }));
        assert_eq!(store.get().unwrap().unwrap().lookback_hours, 24);
    }

    #[test]
    fn test_unbounded_lookback_covers_whole_log() {
        let store = SqliteStorage::open_memory().unwrap();
        let now = base_time();
        seed(&store, &[cgm(1, now - Duration::days(3650)), cgm(2, now)]);
        let uploader = RecordingUploader::default();
        let config = SyncConfig {
            initial_lookback_hours: u32::MAX,
            ..config()
        };

        let result = SyncCoordinator::new(&store, &store, &uploader, &config, 1)
            .sync_all_at(now)
            .unwrap();
        assert_eq!(
            result,
            SyncResult::Success {
                processed_count: 2,
                uploaded_count: 2,
                seq_id_range: (1, 2),
            }
        );
    }

    #[test]
    fn test_retroactive_window_processes_subset_and_clears() {
        let store = SqliteStorage::open_memory().unwrap();
        let now = base_time();
        seed(
            &store,
            &[
                cgm(1, now - Duration::hours(4)),
                cgm(2, now - Duration::hours(3)),
                cgm(3, now - Duration::hours(2)),
                cgm(4, now - Duration::hours(1)),
            ],
        );
        let uploader = RecordingUploader::default();
        let config = config();
        let coordinator = SyncCoordinator::new(&store, &store, &uploader, &config, 1);
        coordinator.sync_all_at(now).unwrap();

        store
            .set_retroactive_range(
                Some(now - Duration::minutes(210)),
                Some(now - Duration::minutes(30)),
            )
            .unwrap();
        let result = coordinator.sync_all_at(now).unwrap();
        assert_eq!(
            result,
            SyncResult::Success {
                processed_count: 3,
                uploaded_count: 3,
                seq_id_range: (2, 4),
            }
        );

        let cursor = store.get().unwrap().unwrap();
        assert!(cursor.retroactive_start.is_none());
        assert!(cursor.retroactive_end.is_none());
        assert_eq!(coordinator.sync_all_at(now).unwrap(), SyncResult::NoData);
    }

    #[test]
    fn test_sync_retroactive_bootstraps_and_runs() {
        let store = SqliteStorage::open_memory().unwrap();
        let now = Utc::now();
        seed(
            &store,
            &[
                cgm(1, now - Duration::hours(50)),
                cgm(2, now - Duration::hours(40)),
                cgm(3, now - Duration::hours(1)),
            ],
        );
        let uploader = RecordingUploader::default();
        let config = config();
        let coordinator = SyncCoordinator::new(&store, &store, &uploader, &config, 1);

        let result = coordinator
            .sync_retroactive(now - Duration::hours(60), now - Duration::hours(30))
            .unwrap();
        assert!(matches!(
            result,
            SyncResult::Success { processed_count: 2, seq_id_range: (1, 2), .. }
        ));
        assert!(store.get().unwrap().unwrap().retroactive_range().is_none());

        assert!(matches!(
            coordinator.sync_retroactive(now, now - Duration::hours(1)),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_request_retroactive_only_records_window() {
        let store = SqliteStorage::open_memory().unwrap();
        let now = Utc::now();
        seed(&store, &[cgm(1, now - Duration::hours(2))]);
        let uploader = RecordingUploader::default();
        let config = config();
        let coordinator = SyncCoordinator::new(&store, &store, &uploader, &config, 1);

        coordinator
            .request_retroactive(now - Duration::hours(3), now)
            .unwrap();

        let cursor = store.get().unwrap().unwrap();
        assert!(cursor.retroactive_range().is_some());
        assert!(!cursor.has_position());
        assert!(uploader.all().is_empty());
    }

    #[test]
    fn test_retroactive_window_does_not_rewind_cursor() {
        let store = SqliteStorage::open_memory().unwrap();
        let now = base_time();
        seed(
            &store,
            &[
                cgm(1, now - Duration::hours(3)),
                cgm(2, now - Duration::hours(2)),
                cgm(3, now - Duration::hours(1)),
            ],
        );
        let uploader = RecordingUploader::default();
        let config = config();
        let coordinator = SyncCoordinator::new(&store, &store, &uploader, &config, 1);
        coordinator.sync_all_at(now).unwrap();

        store
            .set_retroactive_range(Some(now - Duration::hours(4)), Some(now - Duration::minutes(150)))
            .unwrap();
        assert!(matches!(
            coordinator.sync_all_at(now).unwrap(),
            SyncResult::Success { processed_count: 1, seq_id_range: (1, 1), .. }
        ));
        assert_eq!(store.get().unwrap().unwrap().last_processed_seq_id, 3);
    }

    #[test]
    fn test_empty_retroactive_window_is_cleared() {
        let store = SqliteStorage::open_memory().unwrap();
        let now = base_time();
        seed(&store, &[cgm(1, now - Duration::hours(1)), cgm(2, now)]);
        let uploader = RecordingUploader::default();
        let config = config();
        let coordinator = SyncCoordinator::new(&store, &store, &uploader, &config, 1);
        coordinator.sync_all_at(now).unwrap();

        // Window between the two entries holds nothing.
        store
            .set_retroactive_range(
                Some(now - Duration::minutes(50)),
                Some(now - Duration::minutes(10)),
            )
            .unwrap();
        assert_eq!(coordinator.sync_all_at(now).unwrap(), SyncResult::NoData);
        assert!(store.get().unwrap().unwrap().retroactive_range().is_none());
    }

    #[test]
    fn test_dispatch_follows_priority_order() {
        let store = SqliteStorage::open_memory().unwrap();
        let now = base_time();
        let suspend = LogEntry::new(1, 5, PUMPING_SUSPENDED, vec![0; 5], now);
        let status = LogEntry::new(1, 6, DAILY_BASAL, vec![0; 13], now);
        let bolus = LogEntry::new(1, 7, BOLUS_DELIVERY, vec![0; 8], now);
        // Stored out of category order on purpose.
        seed(&store, &[suspend, status, bolus, cgm(8, now), cgm(4, now)]);

        let (list, calls) = scripted(&[]);
        let uploader = RecordingUploader::default();
        let config = config();
        let result = SyncCoordinator::new(&store, &store, &uploader, &config, 1)
            .with_processors(list)
            .sync_all_at(now)
            .unwrap();

        assert_eq!(
            *calls.borrow(),
            vec![
                (ProcessorCategory::CgmReading, vec![4, 8]),
                (ProcessorCategory::Bolus, vec![7]),
                (ProcessorCategory::BasalSuspension, vec![5]),
                (ProcessorCategory::DeviceStatus, vec![6]),
            ]
        );
        assert!(matches!(
            result,
            SyncResult::Success { processed_count: 5, uploaded_count: 5, seq_id_range: (4, 8) }
        ));
    }

    #[test]
    fn test_disabled_category_is_skipped() {
        let store = SqliteStorage::open_memory().unwrap();
        let now = base_time();
        seed(&store, &[cgm(1, now), LogEntry::new(1, 2, BOLUS_DELIVERY, vec![0; 8], now)]);

        let (list, calls) = scripted(&[]);
        let uploader = RecordingUploader::default();
        let mut config = config();
        config.enabled_categories.remove(&ProcessorCategory::CgmReading);

        SyncCoordinator::new(&store, &store, &uploader, &config, 1)
            .with_processors(list)
            .sync_all_at(now)
            .unwrap();
        assert_eq!(*calls.borrow(), vec![(ProcessorCategory::Bolus, vec![2])]);
    }

    #[test]
    fn test_failing_processor_does_not_stop_later_ones() {
        let store = SqliteStorage::open_memory().unwrap();
        let now = base_time();
        seed(
            &store,
            &[cgm(1, now), LogEntry::new(1, 2, BOLUS_DELIVERY, vec![0; 8], now)],
        );

        let (list, calls) = scripted(&[ProcessorCategory::CgmReading]);
        let uploader = RecordingUploader::default();
        let config = config();
        let result = SyncCoordinator::new(&store, &store, &uploader, &config, 1)
            .with_processors(list)
            .sync_all_at(now)
            .unwrap();

        assert_eq!(calls.borrow().len(), 2);
        assert_eq!(
            result,
            SyncResult::Success {
                processed_count: 2,
                uploaded_count: 1,
                seq_id_range: (1, 2),
            }
        );
        // The cursor still advances past the failed category.
        assert_eq!(store.get().unwrap().unwrap().last_processed_seq_id, 2);
    }

    #[test]
    fn test_upload_failure_with_real_processors_is_isolated() {
        let store = SqliteStorage::open_memory().unwrap();
        let now = base_time();
        seed(&store, &[cgm(1, now)]);
        let uploader = RecordingUploader::failing();
        let config = config();

        let result = SyncCoordinator::new(&store, &store, &uploader, &config, 1)
            .sync_all_at(now)
            .unwrap();
        assert!(matches!(
            result,
            SyncResult::Success { processed_count: 1, uploaded_count: 0, .. }
        ));
    }
}
