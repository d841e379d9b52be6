//! Periodic and on-demand sync driver.
//!
//! One worker thread owns the pass function and runs it on a timer or when
//! asked. Requests queue on a channel, so passes never overlap.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, error, info};

use crate::error::{Error, Result};
use crate::sync::SyncResult;

enum Command {
    Run(Option<mpsc::Sender<Result<SyncResult>>>),
    Stop,
}

/// Owned single-worker driver for sync passes.
///
/// The pass function runs on the worker thread, so it should build its own
/// storage and uploader there (SQLite connections are not shareable across
/// threads).
pub struct SyncScheduler {
    commands: mpsc::Sender<Command>,
    worker: Option<JoinHandle<()>>,
    passes: Arc<AtomicU64>,
}

impl SyncScheduler {
    /// Spawn the worker. The first timed pass runs one `interval` after start.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker thread cannot be spawned.
    pub fn start<F>(interval: Duration, mut pass: F) -> Result<Self>
    where
        F: FnMut() -> Result<SyncResult> + Send + 'static,
    {
        let (commands, rx) = mpsc::channel::<Command>();
        let passes = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&passes);

        let worker = thread::Builder::new()
            .name("pumpsync-scheduler".to_string())
            .spawn(move || {
                info!(interval_secs = interval.as_secs(), "Sync scheduler started");
                let mut next_due = Instant::now() + interval;
                loop {
                    let wait = next_due.saturating_duration_since(Instant::now());
                    let reply = match rx.recv_timeout(wait) {
                        Ok(Command::Run(reply)) => {
                            debug!("On-demand sync requested");
                            reply
                        }
                        Err(RecvTimeoutError::Timeout) => {
                            next_due = Instant::now() + interval;
                            None
                        }
                        Ok(Command::Stop) | Err(RecvTimeoutError::Disconnected) => break,
                    };

                    let result = pass();
                    counter.fetch_add(1, Ordering::Relaxed);
                    match &result {
                        Ok(outcome) => info!(result = outcome.label(), "Sync pass finished"),
                        Err(e) => error!(error = %e, "Sync pass failed"),
                    }
                    if let Some(reply) = reply {
                        let _ = reply.send(result);
                    }
                }
                info!("Sync scheduler stopped");
            })?;

        Ok(Self {
            commands,
            worker: Some(worker),
            passes,
        })
    }

    /// Queue a pass and wait for its result.
    ///
    /// # Errors
    ///
    /// Returns the pass error, or [`Error::Other`] if the worker is gone.
    pub fn sync_now(&self) -> Result<SyncResult> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.commands
            .send(Command::Run(Some(reply_tx)))
            .map_err(|_| stopped())?;
        reply_rx.recv().map_err(|_| stopped())?
    }

    /// Queue a pass without waiting for it.
    pub fn trigger(&self) {
        if self.commands.send(Command::Run(None)).is_err() {
            debug!("Sync trigger ignored, scheduler stopped");
        }
    }

    /// Number of passes run so far.
    #[must_use]
    pub fn passes(&self) -> u64 {
        self.passes.load(Ordering::Relaxed)
    }

    /// Block on the worker. The scheduler keeps its own sender alive, so
    /// this only returns if the worker panics; used by the foreground daemon.
    pub fn join(mut self) {
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("Sync scheduler worker panicked");
            }
        }
    }

    /// Stop scheduling. A pass already running finishes first; queued
    /// requests behind the stop are dropped.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let _ = self.commands.send(Command::Stop);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("Sync scheduler worker panicked");
            }
        }
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn stopped() -> Error {
    Error::Other("sync scheduler is not running".to_string())
}
