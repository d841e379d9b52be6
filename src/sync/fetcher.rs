//! Windowed retrieval of the device history log.
//!
//! The device only returns its log in bounded windows. The fetcher splits a
//! missing range into chunks, sends one request per chunk and waits (bounded)
//! for the responses to arrive through [`DeviceLogFetcher::on_entry_received`].
//! A chunk that does not complete in time is logged and skipped; the next
//! status report or gap reconciliation picks it up again.

use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::model::LogEntry;
use crate::sync::{DeviceTransport, LogStore};

/// Hard upper bound on ids per device request.
pub const MAX_CHUNK_SIZE: u32 = 256;

/// Timing and sizing knobs for the fetch loop.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    /// Ids per request, capped at [`MAX_CHUNK_SIZE`].
    pub chunk_size: u32,
    /// How often the chunk wait checks the store.
    pub poll_interval: Duration,
    /// How long one chunk may take before it is abandoned.
    pub chunk_timeout: Duration,
    /// How far back to reach when the local log is empty.
    pub initial_window: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            chunk_size: MAX_CHUNK_SIZE,
            poll_interval: Duration::from_millis(100),
            chunk_timeout: Duration::from_millis(7000),
            initial_window: 5000,
        }
    }
}

/// What one fetch call did. Failures are counted, never returned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchReport {
    /// Requests sent to the device.
    pub chunks: u32,
    /// Chunks abandoned after the wait timed out.
    pub timed_out: u32,
    /// Chunks whose request could not be sent.
    pub failed: u32,
}

impl FetchReport {
    fn merge(&mut self, other: Self) {
        self.chunks += other.chunks;
        self.timed_out += other.timed_out;
        self.failed += other.failed;
    }
}

/// Keeps the local log current with the device.
///
/// Shared between the thread that receives device responses and the
/// background worker that runs range fetches. Range fetches are serialized.
pub struct DeviceLogFetcher<S, T> {
    device_id: u32,
    store: Arc<Mutex<S>>,
    transport: T,
    settings: FetchSettings,
    high_water: AtomicU64,
    range_lock: Mutex<()>,
}

impl<S: LogStore, T: DeviceTransport> DeviceLogFetcher<S, T> {
    #[must_use]
    pub fn new(device_id: u32, store: Arc<Mutex<S>>, transport: T) -> Self {
        Self {
            device_id,
            store,
            transport,
            settings: FetchSettings::default(),
            high_water: AtomicU64::new(0),
            range_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: FetchSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Highest sequence id received from the device so far.
    #[must_use]
    pub fn high_water_mark(&self) -> u64 {
        self.high_water.load(Ordering::Acquire)
    }

    /// Handle a log status report from the device and fetch everything
    /// newer than the local log.
    ///
    /// With an empty local log only the newest
    /// [`FetchSettings::initial_window`] ids are requested. Ids the device
    /// has already retired (below `first_seq_id`) are never requested.
    pub fn on_status_received(&self, last_seq_id: u64, first_seq_id: u64) -> FetchReport {
        let latest = match self.store().latest(self.device_id) {
            Ok(latest) => latest,
            Err(e) => {
                warn!(device_id = self.device_id, error = %e, "Could not read latest stored entry");
                return FetchReport::default();
            }
        };

        let stored = latest.map(|e| e.seq_id);
        let start = stored
            .map_or_else(
                || (last_seq_id.saturating_add(1)).saturating_sub(self.settings.initial_window),
                |seq_id| seq_id.saturating_add(1),
            )
            .max(first_seq_id);

        info!(
            device_id = self.device_id,
            ?stored,
            device_first = first_seq_id,
            device_last = last_seq_id,
            "Device log status received"
        );

        if start > last_seq_id {
            debug!("Local log is up to date");
            return FetchReport::default();
        }
        self.trigger_range(start, last_seq_id)
    }

    /// Fetch `[start, end]` in chunks, waiting for each chunk in turn.
    pub fn trigger_range(&self, start: u64, end: u64) -> FetchReport {
        let mut report = FetchReport::default();
        if start > end {
            return report;
        }

        let _guard = self
            .range_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let chunk_size = self.settings.chunk_size.clamp(1, MAX_CHUNK_SIZE);
        let mut chunk_start = start;
        loop {
            let remaining = (end - chunk_start).saturating_add(1);
            let count = u32::try_from(remaining.min(u64::from(chunk_size))).unwrap_or(chunk_size);
            let chunk_end = chunk_start + u64::from(count) - 1;

            report.chunks += 1;
            debug!(chunk_start, chunk_end, count, "Requesting log chunk");
            match self.transport.request_range(chunk_start, count) {
                Ok(()) => {
                    if !self.wait_for_chunk(chunk_start, chunk_end) {
                        warn!(
                            chunk_start,
                            chunk_end,
                            high_water = self.high_water_mark(),
                            timeout_ms = self.settings.chunk_timeout.as_millis(),
                            "Log chunk timed out, skipping"
                        );
                        report.timed_out += 1;
                    }
                }
                Err(e) => {
                    warn!(chunk_start, chunk_end, error = %e, "Log chunk request failed");
                    report.failed += 1;
                }
            }

            if chunk_end >= end {
                break;
            }
            chunk_start = chunk_end + 1;
        }

        info!(
            start,
            end,
            chunks = report.chunks,
            timed_out = report.timed_out,
            failed = report.failed,
            "Range fetch finished"
        );
        report
    }

    /// Store an entry delivered by the device and advance the high-water mark.
    pub fn on_entry_received(&self, entry: &LogEntry) {
        match self.store().insert_if_absent(entry) {
            Ok(inserted) => {
                if !inserted {
                    debug!(seq_id = entry.seq_id, "Duplicate log entry ignored");
                }
            }
            Err(e) => {
                warn!(seq_id = entry.seq_id, error = %e, "Failed to store log entry");
                return;
            }
        }

        if entry.device_id == self.device_id {
            self.high_water.fetch_max(entry.seq_id, Ordering::AcqRel);
        }
    }

    /// Fetch every hole in the stored id sequence between `first_seq_id`
    /// and `last_seq_id`, newest hole first. The scan is limited to the
    /// newest [`FetchSettings::initial_window`] ids.
    pub fn reconcile_gaps(&self, first_seq_id: u64, last_seq_id: u64) -> FetchReport {
        let floor = (last_seq_id.saturating_add(1)).saturating_sub(self.settings.initial_window);
        let start = first_seq_id.max(floor);
        if start > last_seq_id {
            return FetchReport::default();
        }

        let present = match self
            .store()
            .sequence_ids_between(self.device_id, start, last_seq_id)
        {
            Ok(ids) => ids,
            Err(e) => {
                warn!(error = %e, "Could not read stored sequence ids");
                return FetchReport::default();
            }
        };

        let gaps = missing_ranges(&present, start, last_seq_id);
        let missing: u64 = gaps.iter().map(|g| g.end() - g.start() + 1).sum();
        info!(gaps = gaps.len(), missing, start, end = last_seq_id, "Reconciling log gaps");

        let mut report = FetchReport::default();
        for gap in gaps.into_iter().rev() {
            report.merge(self.trigger_range(*gap.start(), *gap.end()));
        }
        report
    }

    fn store(&self) -> MutexGuard<'_, S> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Poll the store until every id in `[start, end]` is present or the
    /// chunk times out. The store lock is released between polls so the
    /// receiving thread can insert.
    fn wait_for_chunk(&self, start: u64, end: u64) -> bool {
        let expected = usize::try_from(end - start + 1).unwrap_or(usize::MAX);
        let deadline = Instant::now() + self.settings.chunk_timeout;
        loop {
            let stored = self
                .store()
                .sequence_ids_between(self.device_id, start, end)
                .map(|ids| ids.len());
            match stored {
                Ok(n) if n >= expected => return true,
                Ok(_) => {}
                Err(e) => debug!(start, end, error = %e, "Chunk progress check failed"),
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(self.settings.poll_interval);
        }
    }
}

/// Holes in an ascending list of stored ids, restricted to `[min, max]`.
#[must_use]
pub fn missing_ranges(present: &[u64], min: u64, max: u64) -> Vec<RangeInclusive<u64>> {
    let mut gaps = Vec::new();
    if min > max {
        return gaps;
    }

    let mut next = min;
    for &id in present {
        if id < next {
            continue;
        }
        if id > max {
            break;
        }
        if id > next {
            gaps.push(next..=id - 1);
        }
        match id.checked_add(1) {
            Some(n) => next = n,
            None => return gaps,
        }
    }
    if next <= max {
        gaps.push(next..=max);
    }
    gaps
}
