//! Configuration management.
//!
//! Resolves where pumpsync keeps its files and loads the remote sync
//! settings.
//!
//! # Layout
//!
//! - **Database**: `~/.pumpsync/data/pumpsync.db` (override with `--db` or
//!   `PUMPSYNC_DB`)
//! - **Settings**: `~/.pumpsync/config.json`

mod sync_config;

pub use sync_config::{load_config, load_from, save_to, SyncConfig};

use crate::error::{Error, Result};

use std::path::{Path, PathBuf};

/// Get the global pumpsync directory location (`~/.pumpsync/`).
#[must_use]
pub fn global_pumpsync_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".pumpsync"))
}

/// Resolve the database path.
///
/// Priority:
/// 1. If `explicit_path` is provided, use it directly
/// 2. `PUMPSYNC_DB` environment variable
/// 3. Global location: `~/.pumpsync/data/pumpsync.db`
#[must_use]
pub fn resolve_db_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return Some(path.to_path_buf());
    }

    if let Ok(db_path) = std::env::var("PUMPSYNC_DB") {
        if !db_path.trim().is_empty() {
            return Some(PathBuf::from(db_path));
        }
    }

    global_pumpsync_dir().map(|dir| dir.join("data").join("pumpsync.db"))
}

/// Path of the settings file.
///
/// `PUMPSYNC_CONFIG` overrides the default `~/.pumpsync/config.json`.
///
/// # Errors
///
/// Returns [`Error::Config`] if the home directory cannot be determined.
pub fn config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("PUMPSYNC_CONFIG") {
        if !path.trim().is_empty() {
            return Ok(PathBuf::from(path));
        }
    }

    global_pumpsync_dir()
        .map(|dir| dir.join("config.json"))
        .ok_or_else(|| Error::Config("Could not determine home directory".into()))
}

/// Default actor name for audit events written by CLI commands.
#[must_use]
pub fn default_actor() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .map_or_else(|_| "cli".to_string(), |user| format!("cli:{user}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_db_path_with_explicit() {
        let explicit = PathBuf::from("/custom/path/pumpsync.db");
        let result = resolve_db_path(Some(&explicit));
        assert_eq!(result, Some(explicit));
    }

    #[test]
    fn test_global_dir_is_dot_pumpsync() {
        if let Some(dir) = global_pumpsync_dir() {
            assert!(dir.ends_with(".pumpsync"));
        }
    }

    #[test]
    fn test_default_actor_is_prefixed() {
        assert!(default_actor().starts_with("cli"));
    }
}
