//! Application-level error type for the `docket` binary.

use thiserror::Error;

use crate::config;
use crate::export::{ExportError, SnapshotError};
use crate::scrape::ScrapeError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    ConfigLoad(#[from] config::AppConfigError),
    #[error("configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Scrape(#[from] ScrapeError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error("scrape ended without a completion event")]
    IncompleteRun,
}
