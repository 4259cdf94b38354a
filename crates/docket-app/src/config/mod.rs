//! Configuration loading and XDG path helpers.

use std::{env, path::PathBuf, time::Duration};

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::Deserialize;
use thiserror::Error;

use crate::scrape::{
    DEFAULT_MONTHS_BACK, DEFAULT_QUERY_TEMPLATE, HttpSettings, PaginationPolicy, ScrapeOptions,
};

const CONFIG_FILE: &str = "config/settings";
const CONFIG_FILE_ENV: &str = "DOCKET_CONFIG_FILE";
const ENV_PREFIX: &str = "DOCKET";

pub const DEFAULT_ENDPOINT: &str = "https://www.supremecourt.gov/docket/docket.aspx";
pub const DEFAULT_DETAIL_URL_TEMPLATE: &str =
    "https://www.supremecourt.gov/search.aspx?filename=/docketfiles/{id}.htm";

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("unable to resolve project directories")]
    MissingProjectDirs,
    #[error(transparent)]
    Build(#[from] config::ConfigError),
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub scrape: ScrapeConfig,
    pub queries: QueriesConfig,
    pub export: ExportConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScrapeConfig {
    pub endpoint: String,
    #[serde(default)]
    pub detail_url_template: Option<String>,
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_pages: usize,
    pub timeout_secs: u64,
    pub retries: usize,
    pub user_agent: String,
    pub pagination: PaginationPolicy,
}

impl ScrapeConfig {
    pub fn options(&self) -> ScrapeOptions {
        ScrapeOptions::builder()
            .min_delay(Duration::from_millis(self.min_delay_ms))
            .max_delay(Duration::from_millis(self.max_delay_ms))
            .max_pages(self.max_pages)
            .pagination(self.pagination)
            .maybe_detail_url_template(self.detail_url_template.clone())
            .build()
    }

    pub fn http_settings(&self) -> HttpSettings {
        HttpSettings {
            timeout: Duration::from_secs(self.timeout_secs),
            retries: self.retries,
            user_agent: self.user_agent.clone(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct QueriesConfig {
    /// Number of calendar months, counting the current one, to search.
    pub months_back: usize,
    pub template: String,
    /// When non-empty, replaces the generated month queries.
    #[serde(default)]
    pub explicit: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExportConfig {
    pub output_dir: PathBuf,
}

/// Defaults, then the XDG config file, then `./config/settings`, then the file
/// named by `DOCKET_CONFIG_FILE`, then `DOCKET__SECTION__KEY` variables.
pub fn load() -> Result<AppConfig, AppConfigError> {
    let defaults = HttpSettings::default();
    let mut builder = Config::builder()
        .set_default("scrape.endpoint", DEFAULT_ENDPOINT)?
        .set_default("scrape.detail_url_template", DEFAULT_DETAIL_URL_TEMPLATE)?
        .set_default("scrape.min_delay_ms", 1_000)?
        .set_default("scrape.max_delay_ms", 3_000)?
        .set_default("scrape.max_pages", 50)?
        .set_default("scrape.timeout_secs", defaults.timeout.as_secs())?
        .set_default("scrape.retries", defaults.retries as u64)?
        .set_default("scrape.user_agent", defaults.user_agent)?
        .set_default("scrape.pagination", "page_count")?
        .set_default("queries.months_back", DEFAULT_MONTHS_BACK as u64)?
        .set_default("queries.template", DEFAULT_QUERY_TEMPLATE)?
        .set_default("export.output_dir", ".")?;

    if let Ok(dirs) = project_dirs() {
        let xdg = dirs.config_dir().join("settings");
        builder = builder.add_source(File::with_name(&xdg.to_string_lossy()).required(false));
    }
    builder = builder.add_source(File::with_name(CONFIG_FILE).required(false));
    if let Some(path) = env::var_os(CONFIG_FILE_ENV) {
        builder = builder.add_source(File::from(PathBuf::from(path)).required(true));
    }

    let cfg = builder
        .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()?
        .try_deserialize()?;
    Ok(cfg)
}

pub fn project_dirs() -> Result<ProjectDirs, AppConfigError> {
    ProjectDirs::from("dev", "docket", "docket").ok_or(AppConfigError::MissingProjectDirs)
}
