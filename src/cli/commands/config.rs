//! Config command implementations.
//!
//! `show` reports the effective settings (file plus `PUMPSYNC_*`
//! overrides). `set` edits the file only, so environment overrides never
//! get persisted by accident.

use crate::cli::{ConfigCommands, ConfigSetArgs};
use crate::config::{config_path, load_config, load_from, save_to, SyncConfig};
use crate::error::{Error, Result};
use crate::nightscout::NightscoutClient;
use crate::validate::parse_category_list;
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;

/// Settings as shown to the user, secret masked.
#[derive(Serialize)]
struct ConfigView {
    path: PathBuf,
    enabled: bool,
    valid: bool,
    remote_url: String,
    remote_secret: String,
    enabled_categories: Vec<String>,
    sync_interval_minutes: u32,
    initial_lookback_hours: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    device_id: Option<u32>,
}

impl ConfigView {
    fn new(path: PathBuf, config: &SyncConfig) -> Self {
        Self {
            path,
            enabled: config.enabled,
            valid: config.is_valid(),
            remote_url: config.sanitized_url().to_string(),
            remote_secret: config.masked_secret(),
            enabled_categories: config
                .enabled_categories
                .iter()
                .map(ToString::to_string)
                .collect(),
            sync_interval_minutes: config.sync_interval_minutes,
            initial_lookback_hours: config.initial_lookback_hours,
            device_id: config.device_id,
        }
    }

    fn print(&self) {
        println!("{}", "Sync Settings".bold().underline());
        println!("  File:        {}", self.path.display().to_string().dimmed());
        let enabled = if self.enabled {
            "yes".green()
        } else {
            "no".dimmed()
        };
        println!("  Enabled:     {enabled}");
        println!("  URL:         {}", or_unset(&self.remote_url));
        println!("  Secret:      {}", or_unset(&self.remote_secret));
        println!("  Categories:  {}", self.enabled_categories.join(", "));
        println!("  Interval:    {} min", self.sync_interval_minutes);
        println!("  Lookback:    {} h", self.initial_lookback_hours);
        if let Some(device) = self.device_id {
            println!("  Device:      {device}");
        }
        if self.enabled && !self.valid {
            println!();
            println!(
                "{}",
                "Sync is enabled but the URL or secret is missing.".yellow()
            );
        }
    }
}

fn or_unset(value: &str) -> String {
    if value.is_empty() {
        "(not set)".dimmed().to_string()
    } else {
        value.to_string()
    }
}

/// Execute config commands.
///
/// # Errors
///
/// Returns an error if the config file cannot be read or written, an
/// argument is invalid, or the remote check fails.
pub fn execute(command: &ConfigCommands, json: bool) -> Result<()> {
    match command {
        ConfigCommands::Show => show(json),
        ConfigCommands::Set(args) => set(args, json),
        ConfigCommands::Test => test(json),
    }
}

fn show(json: bool) -> Result<()> {
    let view = ConfigView::new(config_path()?, &load_config()?);

    if json {
        println!("{}", serde_json::to_string(&view)?);
    } else {
        view.print();
    }
    Ok(())
}

fn set(args: &ConfigSetArgs, json: bool) -> Result<()> {
    if args.is_empty() {
        return Err(Error::InvalidArgument(
            "Nothing to set; pass at least one of --url, --secret, --enabled, \
             --categories, --interval, --lookback, --device"
                .to_string(),
        ));
    }

    let path = config_path()?;
    let config = apply(load_from(&path)?, args)?;
    save_to(&path, &config)?;

    let view = ConfigView::new(path, &config);
    if json {
        println!("{}", serde_json::to_string(&view)?);
    } else {
        println!("{}", "Settings saved.".green());
        println!();
        view.print();
    }
    Ok(())
}

/// Apply `args` on top of `config`.
fn apply(mut config: SyncConfig, args: &ConfigSetArgs) -> Result<SyncConfig> {
    if let Some(url) = &args.url {
        let url = url.trim();
        if !url.is_empty() && !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(Error::InvalidArgument(format!(
                "URL must start with http:// or https://: {url}"
            )));
        }
        config.remote_url = url.to_string();
    }
    if let Some(secret) = &args.secret {
        config.remote_secret = secret.trim().to_string();
    }
    if let Some(enabled) = args.enabled {
        config.enabled = enabled;
    }
    if let Some(categories) = &args.categories {
        let parsed = parse_category_list(categories)?;
        if parsed.is_empty() {
            return Err(Error::InvalidArgument(
                "At least one category must stay enabled".to_string(),
            ));
        }
        config.enabled_categories = parsed;
    }
    if let Some(interval) = args.interval {
        if interval == 0 {
            return Err(Error::InvalidArgument(
                "Interval must be at least 1 minute".to_string(),
            ));
        }
        config.sync_interval_minutes = interval;
    }
    if let Some(lookback) = args.lookback {
        config.initial_lookback_hours = lookback;
    }
    if let Some(device) = args.device {
        config.device_id = Some(device);
    }
    Ok(config)
}

#[derive(Serialize)]
struct TestOutput {
    url: String,
    reachable: bool,
    latest_entry: Option<String>,
}

fn test(json: bool) -> Result<()> {
    let config = load_config()?;
    let client = NightscoutClient::from_config(&config)?;
    let latest = client.last_entries(1)?;

    let output = TestOutput {
        url: client.base_url().to_string(),
        reachable: true,
        latest_entry: latest.first().map(|e| e.date_string.clone()),
    };

    if json {
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!("{} {}", "Connected to".green(), output.url);
        match output.latest_entry {
            Some(at) if !at.is_empty() => println!("  Latest entry: {at}"),
            _ => println!("  {}", "No entries on the remote yet.".dimmed()),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProcessorCategory;

    #[test]
    fn test_apply_updates_only_given_fields() {
        let args = ConfigSetArgs {
            url: Some(" https://ns.example/ ".into()),
            enabled: Some(true),
            ..ConfigSetArgs::default()
        };
        let config = apply(SyncConfig::default(), &args).unwrap();

        assert!(config.enabled);
        assert_eq!(config.remote_url, "https://ns.example/");
        assert_eq!(config.sync_interval_minutes, 15);
        assert_eq!(config.enabled_categories.len(), 10);
    }

    #[test]
    fn test_apply_parses_categories() {
        let args = ConfigSetArgs {
            categories: Some("bolus, cgm".into()),
            ..ConfigSetArgs::default()
        };
        let config = apply(SyncConfig::default(), &args).unwrap();
        assert_eq!(config.enabled_categories.len(), 2);
        assert!(config.is_category_enabled(ProcessorCategory::Bolus));
        assert!(config.is_category_enabled(ProcessorCategory::CgmReading));
    }

    #[test]
    fn test_apply_rejects_bad_values() {
        let bad_url = ConfigSetArgs {
            url: Some("ns.example".into()),
            ..ConfigSetArgs::default()
        };
        assert!(apply(SyncConfig::default(), &bad_url).is_err());

        let zero_interval = ConfigSetArgs {
            interval: Some(0),
            ..ConfigSetArgs::default()
        };
        assert!(apply(SyncConfig::default(), &zero_interval).is_err());

        let unknown = ConfigSetArgs {
            categories: Some("glucos".into()),
            ..ConfigSetArgs::default()
        };
        assert!(matches!(
            apply(SyncConfig::default(), &unknown),
            Err(Error::InvalidCategory { .. })
        ));
    }

    #[test]
    fn test_view_masks_secret() {
        let config = SyncConfig {
            remote_secret: "supersecret".into(),
            ..SyncConfig::default()
        };
        let view = ConfigView::new(PathBuf::from("/tmp/config.json"), &config);
        assert_eq!(view.remote_secret, "*******cret");
    }
}
