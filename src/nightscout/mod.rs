//! Nightscout remote.
//!
//! - [`models`] - JSON records posted to the API
//! - [`client`] - HTTP client implementing [`crate::sync::RemoteUploader`]

pub mod client;
pub mod models;

pub use client::{hash_secret, NightscoutClient};
pub use models::{DeviceStatus, Entry, PumpStatusInfo, Treatment};
