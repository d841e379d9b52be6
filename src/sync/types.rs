//! Value types shared across the sync pipeline.

use serde::Serialize;

/// Outcome of one synchronization pass.
///
/// Produced fresh by every invocation and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncResult {
    /// Sync is switched off in the configuration.
    Disabled,
    /// The remote URL or secret is blank.
    InvalidConfig,
    /// Nothing new to mirror.
    NoData,
    /// The pass ran to completion.
    Success {
        /// Number of log entries fetched for the pass.
        processed_count: usize,
        /// Number of records the remote accepted.
        uploaded_count: usize,
        /// First and last sequence id covered by the pass.
        seq_id_range: (u64, u64),
    },
}

impl SyncResult {
    /// Short lowercase label for logs and plain output.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::InvalidConfig => "invalid_config",
            Self::NoData => "no_data",
            Self::Success { .. } => "success",
        }
    }
}

/// Remote collection a batch of payloads is posted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadKind {
    Entries,
    Treatments,
    DeviceStatus,
}

impl UploadKind {
    /// API path of the collection, relative to the remote base URL.
    #[must_use]
    pub const fn path(&self) -> &'static str {
        match self {
            Self::Entries => "/api/v1/entries",
            Self::Treatments => "/api/v1/treatments",
            Self::DeviceStatus => "/api/v1/devicestatus",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_serializes_with_status_tag() {
        let result = SyncResult::Success {
            processed_count: 3,
            uploaded_count: 2,
            seq_id_range: (10, 12),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["processed_count"], 3);
        assert_eq!(json["seq_id_range"], serde_json::json!([10, 12]));
    }

    #[test]
    fn test_unit_results_serialize_as_status() {
        let json = serde_json::to_value(SyncResult::NoData).unwrap();
        assert_eq!(json, serde_json::json!({"status": "no_data"}));
        assert_eq!(SyncResult::InvalidConfig.label(), "invalid_config");
    }

    #[test]
    fn test_upload_paths() {
        assert_eq!(UploadKind::Entries.path(), "/api/v1/entries");
        assert_eq!(UploadKind::Treatments.path(), "/api/v1/treatments");
        assert_eq!(UploadKind::DeviceStatus.path(), "/api/v1/devicestatus");
    }
}
