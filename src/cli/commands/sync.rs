//! Sync command implementations.
//!
//! Every pass reads the effective config fresh, so `config set` takes
//! effect on the next daemon pass without a restart.

use crate::cli::SyncCommands;
use crate::cli::commands::{open_storage, resolve_device};
use crate::config::{load_config, SyncConfig};
use crate::error::{Error, Result};
use crate::nightscout::NightscoutClient;
use crate::storage::SqliteStorage;
use crate::sync::{print_status, CursorStore, SyncCoordinator, SyncResult, SyncScheduler, SyncStatus};
use crate::validate::parse_time_arg;
use chrono::Utc;
use colored::Colorize;
use std::path::PathBuf;
use std::time::Duration;

/// Execute sync commands.
///
/// # Errors
///
/// Returns an error if the database is missing, no device can be resolved,
/// arguments are invalid, or the store fails during a pass.
pub fn execute(
    command: &SyncCommands,
    db_path: Option<&PathBuf>,
    device: Option<u32>,
    json: bool,
) -> Result<()> {
    match command {
        SyncCommands::Run => run(db_path, device, json),
        SyncCommands::Status { history } => status(db_path, device, *history, json),
        SyncCommands::Retroactive { start, end, defer } => {
            retroactive(start, end, *defer, db_path, device, json)
        }
        SyncCommands::Reset => reset(db_path, json),
        SyncCommands::Daemon { interval } => daemon(db_path, device, *interval, json),
    }
}

fn client_for(config: &SyncConfig) -> Result<NightscoutClient> {
    // Built even for a disabled or blank remote; the coordinator reports
    // those states before anything is sent.
    NightscoutClient::new(config.sanitized_url(), &config.remote_secret)
}

fn run_pass(storage: &SqliteStorage, config: &SyncConfig, device_id: u32) -> Result<SyncResult> {
    let client = client_for(config)?;
    SyncCoordinator::new(storage, storage, &client, config, device_id).sync_all()
}

fn run(db_path: Option<&PathBuf>, device: Option<u32>, json: bool) -> Result<()> {
    let storage = open_storage(db_path)?;
    let config = load_config()?;
    let device_id = resolve_device(device, &config, &storage)?;

    let outcome = run_pass(&storage, &config, device_id)?;
    print_result(&outcome, json)
}

fn status(db_path: Option<&PathBuf>, device: Option<u32>, history: u32, json: bool) -> Result<()> {
    let storage = open_storage(db_path)?;
    let config = load_config()?;
    // Soft: status is still useful before any log was imported.
    let device_id = resolve_device(device, &config, &storage).ok();

    let status = SyncStatus::collect(&storage, &config, device_id, history)?;
    if json {
        println!("{}", serde_json::to_string(&status)?);
    } else {
        print_status(&status);
    }
    Ok(())
}

fn retroactive(
    start: &str,
    end: &str,
    defer: bool,
    db_path: Option<&PathBuf>,
    device: Option<u32>,
    json: bool,
) -> Result<()> {
    let now = Utc::now();
    let start = parse_time_arg(start, now)?;
    let end = parse_time_arg(end, now)?;

    let storage = open_storage(db_path)?;
    let config = load_config()?;
    let device_id = resolve_device(device, &config, &storage)?;
    let client = client_for(&config)?;
    let coordinator = SyncCoordinator::new(&storage, &storage, &client, &config, device_id);

    if defer {
        coordinator.request_retroactive(start, end)?;
        if json {
            let output = serde_json::json!({
                "requested": true,
                "start": start,
                "end": end,
            });
            println!("{output}");
        } else {
            println!(
                "Retroactive window recorded: {} .. {}",
                start.format("%Y-%m-%d %H:%M"),
                end.format("%Y-%m-%d %H:%M")
            );
            println!("{}", "It runs on the next sync pass.".dimmed());
        }
        return Ok(());
    }

    let outcome = coordinator.sync_retroactive(start, end)?;
    print_result(&outcome, json)
}

fn reset(db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let storage = open_storage(db_path)?;
    let had_cursor = storage.get()?.is_some();
    if had_cursor {
        storage.reset()?;
    }

    if json {
        println!("{}", serde_json::json!({ "reset": had_cursor }));
    } else if had_cursor {
        println!("Sync cursor cleared. The next pass starts from the lookback window.");
    } else {
        println!("{}", "No sync cursor to reset.".dimmed());
    }
    Ok(())
}

fn daemon(
    db_path: Option<&PathBuf>,
    device: Option<u32>,
    interval: Option<u32>,
    json: bool,
) -> Result<()> {
    let storage = open_storage(db_path)?;
    let config = load_config()?;
    let device_id = resolve_device(device, &config, &storage)?;
    drop(storage);

    let minutes = interval.unwrap_or(config.sync_interval_minutes);
    if minutes == 0 {
        return Err(Error::InvalidArgument(
            "Interval must be at least 1 minute".to_string(),
        ));
    }

    let db_path = db_path.cloned();
    let scheduler = SyncScheduler::start(Duration::from_secs(u64::from(minutes) * 60), move || {
        let storage = open_storage(db_path.as_ref())?;
        let config = load_config()?;
        run_pass(&storage, &config, device_id)
    })?;

    if json {
        println!(
            "{}",
            serde_json::json!({ "daemon": "started", "device_id": device_id, "interval_minutes": minutes })
        );
    } else {
        println!("Syncing device {device_id} every {minutes} min. Press Ctrl-C to stop.");
    }

    scheduler.trigger();
    scheduler.join();
    Ok(())
}

fn print_result(outcome: &SyncResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(outcome)?);
        return Ok(());
    }

    match outcome {
        SyncResult::Disabled => {
            println!("{}", "Sync is disabled.".dimmed());
            println!("Enable it with: pumpsync config set --enabled true");
        }
        SyncResult::InvalidConfig => {
            println!("{}", "Sync is enabled but the remote is not configured.".yellow());
            println!("Set it with: pumpsync config set --url <url> --secret <secret>");
        }
        SyncResult::NoData => println!("Nothing new to sync."),
        SyncResult::Success {
            processed_count,
            uploaded_count,
            seq_id_range: (first, last),
        } => {
            println!(
                "{} {processed_count} entries (seq {first} .. {last})",
                "Synced".green()
            );
            println!("  Records uploaded: {uploaded_count}");
        }
    }
    Ok(())
}
