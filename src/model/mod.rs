//! Data types for pumpsync.
//!
//! - [`LogEntry`] - one immutable record of the device history log
//! - [`SyncCursor`] - the persisted synchronization pointer
//! - [`ProcessorCategory`] - the ten mirrored event categories
//! - [`type_ids`] - numeric history log type identifiers

mod category;
mod cursor;
mod log_entry;
pub mod type_ids;

pub use category::ProcessorCategory;
pub use cursor::SyncCursor;
pub use log_entry::LogEntry;
