//! Sync status display.
//!
//! Collects the cursor, remote settings and local log summary into one
//! serializable snapshot for `pumpsync sync status`.

use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;

use crate::config::SyncConfig;
use crate::error::Result;
use crate::model::SyncCursor;
use crate::storage::{LogStats, SqliteStorage};
use crate::sync::{CursorStore, LogStore};

/// One cursor audit row.
#[derive(Debug, Clone, Serialize)]
pub struct CursorChange {
    pub event: String,
    pub actor: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub at: Option<DateTime<Utc>>,
}

/// Snapshot of everything `sync status` reports.
#[derive(Debug, Clone, Serialize)]
pub struct SyncStatus {
    pub enabled: bool,
    pub configured: bool,
    pub remote_url: String,
    pub enabled_categories: Vec<String>,
    pub sync_interval_minutes: u32,
    pub device_id: Option<u32>,
    pub cursor: Option<SyncCursor>,
    pub log: Option<LogStats>,
    /// Stored entries the next pass would pick up (before lookback).
    pub pending: u64,
    pub history: Vec<CursorChange>,
}

impl SyncStatus {
    /// Gather the status for `device_id` (if known).
    ///
    /// # Errors
    ///
    /// Returns an error if database queries fail.
    pub fn collect(
        storage: &SqliteStorage,
        config: &SyncConfig,
        device_id: Option<u32>,
        history_limit: u32,
    ) -> Result<Self> {
        let cursor = storage.get()?;

        let (log, pending) = match device_id {
            Some(id) => {
                let stats = storage.log_stats(id)?;
                let pending = match &cursor {
                    Some(c) if c.has_position() => storage.count_above(id, c.last_processed_seq_id)?,
                    _ => stats.count,
                };
                (Some(stats), pending)
            }
            None => (None, 0),
        };

        let history = storage
            .cursor_history(history_limit)?
            .into_iter()
            .map(|e| CursorChange {
                event: e.event_type.as_str().to_string(),
                actor: e.actor,
                old_value: e.old_value,
                new_value: e.new_value,
                at: DateTime::from_timestamp_millis(e.created_at),
            })
            .collect();

        Ok(Self {
            enabled: config.enabled,
            configured: config.is_valid(),
            remote_url: config.sanitized_url().to_string(),
            enabled_categories: config
                .enabled_categories
                .iter()
                .map(ToString::to_string)
                .collect(),
            sync_interval_minutes: config.sync_interval_minutes,
            device_id,
            cursor,
            log,
            pending,
            history,
        })
    }
}

fn fmt_time(time: DateTime<Utc>) -> String {
    time.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Print sync status to stdout in a human-readable format.
pub fn print_status(status: &SyncStatus) {
    println!("{}", "Sync Status".bold().underline());
    println!();

    // Remote section
    println!("{}", "Remote:".blue().bold());
    let state = match (status.enabled, status.configured) {
        (true, true) => "enabled".green(),
        (true, false) => "enabled, incomplete".yellow(),
        (false, _) => "disabled".dimmed(),
    };
    println!("  State:      {state}");
    if status.remote_url.is_empty() {
        println!("  URL:        {}", "(not set)".dimmed());
    } else {
        println!("  URL:        {}", status.remote_url);
    }
    println!("  Interval:   {} min", status.sync_interval_minutes);
    println!("  Categories: {}", status.enabled_categories.join(", "));
    println!();

    // Cursor section
    println!("{}", "Cursor:".blue().bold());
    match &status.cursor {
        None => println!("  {}", "No sync has run yet.".dimmed()),
        Some(cursor) => {
            if cursor.has_position() {
                println!("  Last seq:   {}", cursor.last_processed_seq_id);
            } else {
                println!(
                    "  Last seq:   {} (first pass uses {}h lookback)",
                    "none".dimmed(),
                    cursor.lookback_hours
                );
            }
            if let Some(at) = cursor.last_processed_time {
                println!("  Last run:   {}", fmt_time(at));
            }
            println!("  Enabled:    {}", fmt_time(cursor.first_enabled_time));
            if let Some((start, end)) = cursor.retroactive_range() {
                println!(
                    "  {} {} .. {}",
                    "Retroactive:".yellow().bold(),
                    fmt_time(start),
                    fmt_time(end)
                );
            }
        }
    }
    println!();

    // Local log section
    match &status.log {
        Some(log) if log.count > 0 => {
            println!("{}", "Local Log:".blue().bold());
            println!("  Device:     {}", log.device_id);
            println!("  Entries:    {}", log.count);
            if let (Some(first), Some(last)) = (log.oldest_seq_id, log.latest_seq_id) {
                println!("  Seq range:  {first} .. {last}");
            }
            if let Some(latest) = log.latest_time {
                println!("  Newest:     {}", fmt_time(latest));
            }
            println!();
            if status.pending > 0 {
                println!(
                    "{}",
                    format!("{} entries pending upload.", status.pending).yellow()
                );
                println!("{}", "Run 'pumpsync sync run' to upload them.".dimmed());
            } else {
                println!("{}", "Everything is synced.".green());
            }
        }
        Some(_) => println!("{}", "Local log is empty.".dimmed()),
        None => println!(
            "{}",
            "No device selected. Pass --device or import a log first.".dimmed()
        ),
    }

    if !status.history.is_empty() {
        println!();
        println!("{}", "Recent Cursor Changes:".blue().bold());
        for change in &status.history {
            let at = change.at.map(fmt_time).unwrap_or_default();
            let values = match (&change.old_value, &change.new_value) {
                (Some(old), Some(new)) => format!(" {old} -> {new}"),
                (None, Some(new)) => format!(" {new}"),
                _ => String::new(),
            };
            println!("  {at}  {}{values} ({})", change.event, change.actor.dimmed());
        }
    }
}
