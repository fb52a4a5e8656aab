//! Storage configuration
//!
//! The backend selector and storage locations are configuration, not
//! hardcoded. The server crate fills this from the environment.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::db::Database;
use crate::engine::StorageEngine;
use crate::error::{Result, StoreError};
use crate::file::FileStore;

/// Which persistence backend to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Flat JSON file holding the whole object graph.
    File,
    /// Embedded relational database.
    Db,
}

impl std::str::FromStr for BackendKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "file" => Ok(BackendKind::File),
            "db" => Ok(BackendKind::Db),
            other => Err(StoreError::Validation(format!(
                "unknown storage backend `{other}` (expected `file` or `db`)"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: BackendKind,
    pub file_path: PathBuf,
    pub database_path: PathBuf,
}

impl StoreConfig {
    /// Default locations under one data directory.
    pub fn for_data_dir(backend: BackendKind, data_dir: impl AsRef<Path>) -> Self {
        let data_dir = data_dir.as_ref();
        Self {
            backend,
            file_path: data_dir.join("lodge.json"),
            database_path: data_dir.join("lodge.db"),
        }
    }
}

/// Construct the configured engine. The caller owns the lifecycle:
/// `reload()` once at startup, `close()` per unit of work.
pub async fn open(config: &StoreConfig) -> Result<Arc<dyn StorageEngine>> {
    match config.backend {
        BackendKind::File => Ok(Arc::new(FileStore::new(&config.file_path))),
        BackendKind::Db => Ok(Arc::new(Database::new(&config.database_path).await?)),
    }
}
