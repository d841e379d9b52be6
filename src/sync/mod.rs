//! History log mirroring.
//!
//! This module moves pump history log entries from the device into the
//! local store and from the store to the remote service:
//!
//! - **Fetch**: [`DeviceLogFetcher`] pulls missing ranges from the device
//!   in bounded chunks
//! - **Coordinate**: [`SyncCoordinator`] runs one pass from the cursor
//!   through every enabled category processor
//! - **Schedule**: [`SyncScheduler`] drives passes on a timer and on demand
//! - **Status**: cursor and log summaries for the CLI
//!
//! # Architecture
//!
//! Each pass follows the same steps:
//! 1. Bootstrap the cursor on first use
//! 2. Pick a sequence range (retroactive window, resume point or lookback)
//! 3. Dispatch the range through the processors in fixed priority order
//! 4. Commit the highest fetched sequence id
//!
//! # Example
//!
//! ```ignore
//! use pumpsync::sync::{SyncCoordinator, SyncResult};
//!
//! let coordinator = SyncCoordinator::new(&storage, &storage, &client, &config, device_id);
//! match coordinator.sync_all()? {
//!     SyncResult::Success { uploaded_count, .. } => println!("{uploaded_count} uploaded"),
//!     other => println!("{}", other.label()),
//! }
//! ```

mod coordinator;
mod fetcher;
mod file;
pub mod processors;
mod scheduler;
mod status;
mod traits;
mod types;

pub use coordinator::SyncCoordinator;
pub use fetcher::{missing_ranges, DeviceLogFetcher, FetchReport, FetchSettings, MAX_CHUNK_SIZE};
pub use file::{read_jsonl, ImportRecord};
pub use processors::{registry, ProcessContext, Processor};
pub use scheduler::SyncScheduler;
pub use status::{print_status, SyncStatus};
pub use traits::{CursorStore, DeviceTransport, LogStore, RemoteUploader};
pub use types::{SyncResult, UploadKind};
