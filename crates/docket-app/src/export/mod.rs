//! Output sinks: the CSV artifact and JSON snapshots of enriched records.

pub mod csv;
pub mod snapshot;

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs;
use tracing::info;

pub use self::csv::{FlatRow, flatten, to_csv};
pub use snapshot::{SnapshotError, read_snapshot, write_snapshot};

pub const EXPORT_FILE_NAME: &str = "scotus_details.csv";
pub const EXPORT_MIME_TYPE: &str = "text/csv";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("csv serialization error: {0}")]
    Csv(#[from] ::csv::Error),
    #[error("failed to flush csv buffer: {0}")]
    Flush(String),
    #[error("csv output is not valid UTF-8: {0}")]
    Encoding(String),
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Writes `csv` to `<dir>/scotus_details.csv`. An empty document is not written
/// and yields `None`.
pub async fn write_csv_export(dir: &Path, csv: &str) -> Result<Option<PathBuf>, ExportError> {
    if csv.is_empty() {
        info!(stage = "export", "no rows to export; skipping file");
        return Ok(None);
    }

    fs::create_dir_all(dir).await.map_err(|source| ExportError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let path = dir.join(EXPORT_FILE_NAME);
    fs::write(&path, csv).await.map_err(|source| ExportError::Io {
        path: path.clone(),
        source,
    })?;
    info!(
        stage = "export",
        path = %path.display(),
        bytes = csv.len(),
        mime = EXPORT_MIME_TYPE,
        "wrote csv export"
    );
    Ok(Some(path))
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn writes_named_artifact() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("nested");
        let path = write_csv_export(&out, "\"id\"\n").await.unwrap().unwrap();
        assert_eq!(path, out.join(EXPORT_FILE_NAME));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "\"id\"\n");
    }

    #[tokio::test]
    async fn empty_document_is_not_written() {
        let temp = TempDir::new().unwrap();
        assert!(write_csv_export(temp.path(), "").await.unwrap().is_none());
        assert!(!temp.path().join(EXPORT_FILE_NAME).exists());
    }
}
