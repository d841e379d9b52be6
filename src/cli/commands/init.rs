//! Initialize pumpsync.
//!
//! Creates the database at the resolved path (applying the schema) and
//! writes a default `config.json` if none exists yet. Sync stays disabled
//! until a remote is configured with `pumpsync config set`.

use crate::config::{config_path, resolve_db_path, save_to, SyncConfig};
use crate::error::{Error, Result};
use crate::storage::SqliteStorage;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;

#[derive(Serialize)]
struct InitOutput {
    database: PathBuf,
    config: PathBuf,
    config_created: bool,
}

/// Execute the init command.
///
/// # Errors
///
/// Returns an error if the database already exists (without `force`), or
/// if the directory, database or config file cannot be created.
pub fn execute(db_path: Option<&PathBuf>, force: bool, json: bool) -> Result<()> {
    let db_path = resolve_db_path(db_path.map(|p| p.as_path())).ok_or_else(|| {
        Error::Config("Could not determine the pumpsync data directory".to_string())
    })?;

    if db_path.exists() {
        if !force {
            return Err(Error::AlreadyInitialized { path: db_path });
        }
        fs::remove_file(&db_path)?;
        for suffix in ["-wal", "-shm"] {
            let sidecar = PathBuf::from(format!("{}{suffix}", db_path.display()));
            if sidecar.exists() {
                fs::remove_file(sidecar)?;
            }
        }
    }

    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)?;
    }

    // Opening applies the schema.
    SqliteStorage::open(&db_path)?;

    let config = config_path()?;
    let config_created = !config.exists();
    if config_created {
        save_to(&config, &SyncConfig::default())?;
    }

    if json {
        let output = InitOutput {
            database: db_path,
            config,
            config_created,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!("Initialized pumpsync database");
        println!("  Database: {}", db_path.display());
        println!("  Config:   {}", config.display());
        println!();
        println!("Next: pumpsync config set --url <nightscout-url> --secret <api-secret> --enabled true");
    }

    Ok(())
}
