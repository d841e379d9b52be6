//! HTTP client for the Nightscout REST API.
//!
//! Requests are authenticated with the `api-secret` header carrying the
//! lowercase hex SHA-1 of the configured secret.

use std::time::Duration;

use sha1::{Digest, Sha1};
use tracing::{debug, warn};

use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::sync::{RemoteUploader, UploadKind};

use super::models::Entry;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Blocking facade over an async `reqwest` client.
///
/// Owns a private tokio runtime so the synchronous sync core can call it
/// directly. Must not be used from inside another tokio runtime.
pub struct NightscoutClient {
    client: reqwest::Client,
    runtime: tokio::runtime::Runtime,
    base_url: String,
    secret_hash: String,
}

impl NightscoutClient {
    /// Create a client for `base_url` (trailing slashes are stripped).
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client or runtime cannot be built.
    pub fn new(base_url: &str, secret: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {e}")))?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        Ok(Self {
            client,
            runtime,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            secret_hash: hash_secret(secret),
        })
    }

    /// Create a client from the remote settings of `config`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the settings are incomplete.
    pub fn from_config(config: &SyncConfig) -> Result<Self> {
        if !config.is_valid() {
            return Err(Error::Config(
                "Nightscout URL and API secret must both be set".to_string(),
            ));
        }
        Self::new(config.sanitized_url(), &config.remote_secret)
    }

    /// Base URL requests are sent to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the newest `count` entries. Used to check connectivity and
    /// credentials.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Upload`] if the request fails or the remote rejects it.
    pub fn last_entries(&self, count: u32) -> Result<Vec<Entry>> {
        let endpoint = format!("{}?count={count}", UploadKind::Entries.path());
        let url = format!("{}{endpoint}", self.base_url);

        self.runtime.block_on(async {
            let response = self
                .client
                .get(&url)
                .header("api-secret", &self.secret_hash)
                .header("Accept", "application/json")
                .send()
                .await
                .map_err(|e| upload_error(&endpoint, format!("request failed: {e}")))?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(upload_error(&endpoint, format!("{status}: {body}")));
            }

            response
                .json::<Vec<Entry>>()
                .await
                .map_err(|e| upload_error(&endpoint, format!("unreadable response: {e}")))
        })
    }

    async fn post(&self, endpoint: &str, payloads: &[serde_json::Value]) -> Result<()> {
        let url = format!("{}{endpoint}", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("api-secret", &self.secret_hash)
            .json(payloads)
            .send()
            .await
            .map_err(|e| upload_error(endpoint, format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(upload_error(endpoint, format!("{status}: {body}")));
        }

        Ok(())
    }
}

impl RemoteUploader for NightscoutClient {
    fn upload_batch(&self, kind: UploadKind, payloads: &[serde_json::Value]) -> Result<usize> {
        if payloads.is_empty() {
            return Ok(0);
        }

        let endpoint = kind.path();
        match self.runtime.block_on(self.post(endpoint, payloads)) {
            Ok(()) => {
                debug!(endpoint, count = payloads.len(), "Uploaded batch");
                Ok(payloads.len())
            }
            Err(e) => {
                warn!(endpoint, count = payloads.len(), error = %e, "Upload failed");
                Err(e)
            }
        }
    }
}

/// Lowercase hex SHA-1 digest, as Nightscout expects in `api-secret`.
#[must_use]
pub fn hash_secret(secret: &str) -> String {
    Sha1::digest(secret.as_bytes())
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

fn upload_error(endpoint: &str, message: String) -> Error {
    Error::Upload {
        endpoint: endpoint.to_string(),
        message,
    }
}
