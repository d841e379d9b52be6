//! Command implementations.

pub mod completions;
pub mod config;
pub mod init;
pub mod log;
pub mod sync;
pub mod version;

use crate::config::{resolve_db_path, SyncConfig};
use crate::error::{Error, Result};
use crate::storage::SqliteStorage;
use std::path::PathBuf;

/// Open the database, failing if `pumpsync init` has not run.
pub(crate) fn open_storage(db_path: Option<&PathBuf>) -> Result<SqliteStorage> {
    let db_path = resolve_db_path(db_path.map(|p| p.as_path())).ok_or(Error::NotInitialized)?;

    if !db_path.exists() {
        return Err(Error::NotInitialized);
    }

    SqliteStorage::open(&db_path)
}

/// Pick the device to operate on.
///
/// Priority: `--device`, then the configured default, then the only device
/// present in the local log.
pub(crate) fn resolve_device(
    explicit: Option<u32>,
    config: &SyncConfig,
    storage: &SqliteStorage,
) -> Result<u32> {
    if let Some(id) = explicit.or(config.device_id) {
        return Ok(id);
    }

    match storage.device_ids()?.as_slice() {
        [only] => Ok(*only),
        [] => Err(Error::InvalidArgument(
            "No device known yet; pass --device or import a log first".to_string(),
        )),
        many => Err(Error::InvalidArgument(format!(
            "Several devices in the log ({}); pass --device",
            many.iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LogEntry;
    use crate::sync::LogStore;
    use chrono::Utc;

    #[test]
    fn test_resolve_device_priority() {
        let storage = SqliteStorage::open_memory().unwrap();
        let mut config = SyncConfig::default();

        assert!(matches!(
            resolve_device(None, &config, &storage),
            Err(Error::InvalidArgument(_))
        ));

        storage
            .insert_if_absent(&LogEntry::new(9, 1, 3, vec![], Utc::now()))
            .unwrap();
        assert_eq!(resolve_device(None, &config, &storage).unwrap(), 9);

        config.device_id = Some(5);
        assert_eq!(resolve_device(None, &config, &storage).unwrap(), 5);
        assert_eq!(resolve_device(Some(7), &config, &storage).unwrap(), 7);
    }

    #[test]
    fn test_resolve_device_ambiguous() {
        let storage = SqliteStorage::open_memory().unwrap();
        for device in [1, 2] {
            storage
                .insert_if_absent(&LogEntry::new(device, 1, 3, vec![], Utc::now()))
                .unwrap();
        }
        let err = resolve_device(None, &SyncConfig::default(), &storage).unwrap_err();
        assert!(err.to_string().contains("1, 2"));
    }

    #[test]
    fn test_open_storage_requires_init() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.db");
        assert!(matches!(
            open_storage(Some(&missing)),
            Err(Error::NotInitialized)
        ));
    }
}
