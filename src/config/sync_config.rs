//! Remote sync settings.
//!
//! Loaded from and saved to `~/.pumpsync/config.json`. Environment
//! variables take precedence over the file:
//!
//! - `PUMPSYNC_URL` - Nightscout base URL
//! - `PUMPSYNC_SECRET` - Nightscout API secret
//! - `PUMPSYNC_ENABLED` - `1`/`true`/`yes` to enable, anything else disables

use crate::error::{Error, Result};
use crate::model::ProcessorCategory;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

/// Settings read by the sync core. Never mutated by it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub enabled: bool,
    pub remote_url: String,
    pub remote_secret: String,
    pub enabled_categories: BTreeSet<ProcessorCategory>,
    pub sync_interval_minutes: u32,
    pub initial_lookback_hours: u32,
    /// Device serial used when `--device` is not given.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<u32>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            remote_url: String::new(),
            remote_secret: String::new(),
            enabled_categories: ProcessorCategory::ALL.into_iter().collect(),
            sync_interval_minutes: 15,
            initial_lookback_hours: 24,
            device_id: None,
        }
    }
}

impl SyncConfig {
    /// Valid iff both the URL and the secret are non-blank.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.remote_url.trim().is_empty() && !self.remote_secret.trim().is_empty()
    }

    /// Remote URL without trailing slashes.
    #[must_use]
    pub fn sanitized_url(&self) -> &str {
        self.remote_url.trim().trim_end_matches('/')
    }

    /// Whether the given category should be mirrored.
    #[must_use]
    pub fn is_category_enabled(&self, category: ProcessorCategory) -> bool {
        self.enabled_categories.contains(&category)
    }

    /// Apply `PUMPSYNC_*` overrides from the process environment.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup (empty values are ignored).
    #[must_use]
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get("PUMPSYNC_URL") {
            self.remote_url = url;
        }
        if let Some(secret) = get("PUMPSYNC_SECRET") {
            self.remote_secret = secret;
        }
        if let Some(enabled) = get("PUMPSYNC_ENABLED") {
            self.enabled = matches!(
                enabled.trim().to_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }
        self
    }

    /// Secret with all but the last four characters masked, for display.
    #[must_use]
    pub fn masked_secret(&self) -> String {
        let chars: Vec<char> = self.remote_secret.chars().collect();
        if chars.len() <= 4 {
            return "*".repeat(chars.len());
        }
        let visible: String = chars[chars.len() - 4..].iter().collect();
        format!("{}{visible}", "*".repeat(chars.len() - 4))
    }
}

/// Load settings from `path`, falling back to defaults when it is absent.
///
/// # Errors
///
/// Returns [`Error::Config`] if the file exists but cannot be read or parsed.
pub fn load_from(path: &Path) -> Result<SyncConfig> {
    if !path.exists() {
        return Ok(SyncConfig::default());
    }

    let content = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read config file: {e}")))?;

    serde_json::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse config file: {e}")))
}

/// Save settings to `path`, creating parent directories.
///
/// # Errors
///
/// Returns [`Error::Config`] if the file cannot be written.
pub fn save_to(path: &Path, config: &SyncConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| Error::Config(format!("Failed to create config directory: {e}")))?;
    }

    let content = serde_json::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Failed to serialize config: {e}")))?;

    fs::write(path, content)
        .map_err(|e| Error::Config(format!("Failed to write config file: {e}")))?;

    Ok(())
}

/// Load settings from the global config file and apply env overrides.
///
/// # Errors
///
/// Returns [`Error::Config`] if the home directory is unknown or the file
/// is unreadable.
pub fn load_config() -> Result<SyncConfig> {
    let path = super::config_path()?;
    Ok(load_from(&path)?.with_env_overrides())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert!(!config.enabled);
        assert!(!config.is_valid());
        assert_eq!(config.enabled_categories.len(), 10);
        assert_eq!(config.sync_interval_minutes, 15);
        assert_eq!(config.initial_lookback_hours, 24);
    }

    #[test]
    fn test_validity_requires_url_and_secret() {
        let mut config = SyncConfig {
            remote_url: "https://ns.example".into(),
            ..SyncConfig::default()
        };
        assert!(!config.is_valid());
        config.remote_secret = "   ".into();
        assert!(!config.is_valid());
        config.remote_secret = "hunter2hunter2".into();
        assert!(config.is_valid());
    }

    #[test]
    fn test_sanitized_url_strips_trailing_slash() {
        let config = SyncConfig {
            remote_url: "https://ns.example//".into(),
            ..SyncConfig::default()
        };
        assert_eq!(config.sanitized_url(), "https://ns.example");
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, SyncConfig::default());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = SyncConfig {
            enabled: true,
            remote_url: "https://ns.example".into(),
            remote_secret: "secret-value".into(),
            enabled_categories: [ProcessorCategory::Bolus, ProcessorCategory::CgmReading]
                .into_iter()
                .collect(),
            sync_interval_minutes: 5,
            initial_lookback_hours: 48,
            device_id: Some(1234),
        };

        save_to(&path, &config).unwrap();
        assert_eq!(load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"enabled": true, "remote_url": "https://x"}"#).unwrap();

        let config = load_from(&path).unwrap();
        assert!(config.enabled);
        assert_eq!(config.initial_lookback_hours, 24);
        assert_eq!(config.enabled_categories.len(), 10);
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(load_from(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_overrides_take_precedence() {
        let config = SyncConfig::default().with_overrides(|key| match key {
            "PUMPSYNC_URL" => Some("https://env.example".into()),
            "PUMPSYNC_SECRET" => Some("env-secret".into()),
            "PUMPSYNC_ENABLED" => Some("TRUE".into()),
            _ => None,
        });
        assert!(config.enabled);
        assert_eq!(config.remote_url, "https://env.example");
        assert!(config.is_valid());

        let blank = config.clone().with_overrides(|_| Some(String::new()));
        assert_eq!(blank, config);
    }

    #[test]
    fn test_masked_secret() {
        let config = SyncConfig {
            remote_secret: "abcdefgh".into(),
            ..SyncConfig::default()
        };
        assert_eq!(config.masked_secret(), "****efgh");
    }
}
