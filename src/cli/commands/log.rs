//! Log command implementations (JSONL import and stats).

use crate::cli::LogCommands;
use crate::cli::commands::{open_storage, resolve_device};
use crate::config::{default_actor, load_config};
use crate::error::Result;
use crate::model::{LogEntry, ProcessorCategory};
use crate::storage::LogStats;
use crate::sync::read_jsonl;
use colored::Colorize;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Execute log commands.
///
/// # Errors
///
/// Returns an error if the database is missing, the import file is
/// invalid, or no device can be resolved.
pub fn execute(
    command: &LogCommands,
    db_path: Option<&PathBuf>,
    device: Option<u32>,
    json: bool,
) -> Result<()> {
    match command {
        LogCommands::Import { file } => import(file, db_path, device, json),
        LogCommands::Stats => stats(db_path, device, json),
    }
}

#[derive(Serialize)]
struct ImportOutput {
    file: String,
    read: usize,
    imported: usize,
    skipped: usize,
}

fn import(file: &Path, db_path: Option<&PathBuf>, device: Option<u32>, json: bool) -> Result<()> {
    let storage = open_storage(db_path)?;
    let config = load_config()?;
    let fallback_device = device.or(config.device_id);

    let entries = read_jsonl(file)?
        .into_iter()
        .map(|record| record.into_entry(fallback_device))
        .collect::<Result<Vec<LogEntry>>>()?;

    let imported = storage.insert_batch(&entries, &default_actor())?;
    info!(
        file = %file.display(),
        read = entries.len(),
        imported,
        "Imported history log"
    );

    let output = ImportOutput {
        file: file.display().to_string(),
        read: entries.len(),
        imported,
        skipped: entries.len() - imported,
    };

    if json {
        println!("{}", serde_json::to_string(&output)?);
    } else if output.read == 0 {
        println!("No entries in {}", output.file);
    } else {
        println!("Import complete: {}", output.file);
        println!("  Imported: {}", output.imported.to_string().green());
        if output.skipped > 0 {
            println!("  Skipped:  {} (already stored)", output.skipped);
        }
    }
    Ok(())
}

fn stats(db_path: Option<&PathBuf>, device: Option<u32>, json: bool) -> Result<()> {
    let storage = open_storage(db_path)?;
    let config = load_config()?;
    let device_id = resolve_device(device, &config, &storage)?;
    let stats = storage.log_stats(device_id)?;

    if json {
        println!("{}", serde_json::to_string(&stats)?);
    } else {
        print_stats(&stats);
    }
    Ok(())
}

fn print_stats(stats: &LogStats) {
    println!("{}", format!("History Log: device {}", stats.device_id).bold().underline());
    println!();

    if stats.count == 0 {
        println!("{}", "No entries stored.".dimmed());
        return;
    }

    println!("  Entries:   {}", stats.count);
    if let (Some(first), Some(last)) = (stats.oldest_seq_id, stats.latest_seq_id) {
        let span = last - first + 1;
        println!("  Seq range: {first} .. {last}");
        if span > stats.count {
            println!(
                "  {}",
                format!("{} ids missing in range", span - stats.count).yellow()
            );
        }
    }
    if let (Some(oldest), Some(latest)) = (stats.oldest_time, stats.latest_time) {
        println!(
            "  Time:      {} .. {}",
            oldest.format("%Y-%m-%d %H:%M"),
            latest.format("%Y-%m-%d %H:%M")
        );
    }

    println!();
    println!("{}", "By Type:".blue().bold());
    for (type_id, count) in &stats.by_type {
        let category = ProcessorCategory::for_type_id(*type_id)
            .map_or_else(|| "unmirrored".dimmed().to_string(), |c| c.display_name().to_string());
        println!("  {type_id:>5}  {count:>7}  {category}");
    }
}
