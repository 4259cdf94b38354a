//! JSON snapshots of enriched records, consumed by `compare` and `export`.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs;

use crate::scrape::types::ResultRecord;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to access snapshot {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid snapshot {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Writes the records as a pretty-printed JSON array, creating parent directories.
pub async fn write_snapshot(path: &Path, records: &[ResultRecord]) -> Result<(), SnapshotError> {
    let io_err = |source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await.map_err(io_err)?;
    }
    let json = serde_json::to_vec_pretty(records).map_err(|source| SnapshotError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, json).await.map_err(io_err)
}

pub async fn read_snapshot(path: &Path) -> Result<Vec<ResultRecord>, SnapshotError> {
    let bytes = fs::read(path).await.map_err(|source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| SnapshotError::Json {
        path: path.to_path_buf(),
        source,
    })
}
