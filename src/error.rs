//! Error types for pumpsync.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=db, 4=validation, 6=upload, etc.)
//! - Retryability flags for scripted callers
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pumpsync operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
///
/// Each code maps to a SCREAMING_SNAKE string and a category-based
/// exit code. Scripts match on the string or on the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Database (exit 2)
    NotInitialized,
    AlreadyInitialized,
    DatabaseError,

    // Validation (exit 4)
    InvalidArgument,
    InvalidCategory,
    InvalidPayload,

    // Upload (exit 6)
    UploadError,

    // Config (exit 7)
    ConfigError,

    // I/O (exit 8)
    IoError,
    JsonError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::AlreadyInitialized => "ALREADY_INITIALIZED",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::InvalidCategory => "INVALID_CATEGORY",
            Self::InvalidPayload => "INVALID_PAYLOAD",
            Self::UploadError => "UPLOAD_ERROR",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code (1-8).
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::NotInitialized | Self::AlreadyInitialized | Self::DatabaseError => 2,
            Self::InvalidArgument | Self::InvalidCategory | Self::InvalidPayload => 4,
            Self::UploadError => 6,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError => 8,
        }
    }

    /// Whether retrying the same command later can succeed.
    ///
    /// True for upload failures (the remote may come back) and busy
    /// databases. False for bad input and missing setup.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::UploadError | Self::DatabaseError)
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in pumpsync operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Not initialized: run `pumpsync init` first")]
    NotInitialized,

    #[error("Already initialized at {path}")]
    AlreadyInitialized { path: PathBuf },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unknown category: {input}")]
    InvalidCategory {
        input: String,
        suggestion: Option<String>,
    },

    #[error("Malformed payload for seq {seq_id} (type {type_id}): {message}")]
    InvalidPayload {
        seq_id: u64,
        type_id: u32,
        message: String,
    },

    #[error("Upload to {endpoint} failed: {message}")]
    Upload { endpoint: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotInitialized => ErrorCode::NotInitialized,
            Self::AlreadyInitialized { .. } => ErrorCode::AlreadyInitialized,
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::InvalidCategory { .. } => ErrorCode::InvalidCategory,
            Self::InvalidPayload { .. } => ErrorCode::InvalidPayload,
            Self::Upload { .. } => ErrorCode::UploadError,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Context-aware recovery hint.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::NotInitialized => {
                Some("Run `pumpsync init` to create the database".to_string())
            }

            Self::AlreadyInitialized { path } => Some(format!(
                "Database already exists at {}. Use `--force` to reinitialize.",
                path.display()
            )),

            Self::InvalidCategory { suggestion, .. } => {
                let valid = crate::model::ProcessorCategory::ALL
                    .iter()
                    .map(|c| c.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                match suggestion {
                    Some(s) => Some(format!("Did you mean: {s}? Valid categories: {valid}")),
                    None => Some(format!("Valid categories: {valid}")),
                }
            }

            Self::Upload { .. } => Some(
                "Check the Nightscout URL and API secret with `pumpsync config show`. \
                 The next sync pass retries automatically."
                    .to_string(),
            ),

            Self::Config(_) => Some(
                "Set the remote with: pumpsync config set --url <url> --secret <secret>"
                    .to_string(),
            ),

            Self::Database(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::InvalidArgument(_)
            | Self::InvalidPayload { .. }
            | Self::Other(_) => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    ///
    /// Includes error code, message, retryability, exit code, and
    /// optional recovery hint.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_by_category() {
        assert_eq!(Error::NotInitialized.exit_code(), 2);
        assert_eq!(Error::InvalidArgument("x".into()).exit_code(), 4);
        assert_eq!(
            Error::Upload {
                endpoint: "/api/v1/entries".into(),
                message: "503".into()
            }
            .exit_code(),
            6
        );
        assert_eq!(Error::Config("x".into()).exit_code(), 7);
        assert_eq!(Error::Other("x".into()).exit_code(), 1);
    }

    #[test]
    fn test_structured_json_includes_hint() {
        let err = Error::InvalidCategory {
            input: "glucos".into(),
            suggestion: Some("cgm_reading".into()),
        };
        let json = err.to_structured_json();
        assert_eq!(json["error"]["code"], "INVALID_CATEGORY");
        assert_eq!(json["error"]["retryable"], false);
        let hint = json["error"]["hint"].as_str().unwrap();
        assert!(hint.contains("cgm_reading"));
        assert!(hint.contains("device_status"));
    }

    #[test]
    fn test_upload_is_retryable() {
        let err = Error::Upload {
            endpoint: "/api/v1/treatments".into(),
            message: "timeout".into(),
        };
        assert!(err.error_code().is_retryable());
        assert!(!Error::NotInitialized.error_code().is_retryable());
    }
}
