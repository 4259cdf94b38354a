use std::{sync::Arc, time::Duration};

use bon::Builder;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::ParseError;

use crate::scrape::results::PaginationPolicy;

/// Hidden ASP.NET form state that has to be echoed back on every submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchSession {
    /// `__VIEWSTATE`; replaced after every response.
    pub current_token: String,
    /// `__VIEWSTATEGENERATOR`; fixed for the lifetime of one query.
    pub token_generator: String,
}

impl SearchSession {
    pub fn new(current_token: impl Into<String>, token_generator: impl Into<String>) -> Self {
        Self {
            current_token: current_token.into(),
            token_generator: token_generator.into(),
        }
    }

    /// Session for the next submission: fresh token, same generator.
    pub fn advance(&self, next_token: impl Into<String>) -> Self {
        Self {
            current_token: next_token.into(),
            token_generator: self.token_generator.clone(),
        }
    }
}

/// One chronological entry from a case's docket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DetailEntry {
    /// Normalised to `MM/DD/YYYY` when the source date is recognisable.
    pub date: String,
    #[serde(alias = "detail")]
    pub description: String,
}

impl DetailEntry {
    pub fn new(date: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            description: description.into(),
        }
    }
}

/// A single "Docket for ..." block from a result page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub id: Option<String>,
    #[serde(alias = "url")]
    pub detail_url: String,
    pub title: String,
    pub petitioner: String,
    #[serde(alias = "prevailing")]
    pub respondent: String,
    #[serde(default)]
    pub entries: Vec<DetailEntry>,
}

/// Parsed view of one fetched result page (full page or delta payload).
#[derive(Debug, Clone, Default)]
pub struct PageParseResult {
    pub records: Vec<ResultRecord>,
    pub next_token: String,
    pub has_more: bool,
}

/// Knobs for one scrape run.
#[derive(Debug, Clone, Builder)]
pub struct ScrapeOptions {
    #[builder(default = Duration::from_millis(1_000))]
    pub min_delay: Duration,
    #[builder(default = Duration::from_millis(3_000))]
    pub max_delay: Duration,
    /// Upper bound on result pages fetched per query.
    #[builder(default = 50)]
    pub max_pages: usize,
    #[builder(default)]
    pub pagination: PaginationPolicy,
    /// Used when a result block has an id but no anchor; `{id}` is substituted.
    pub detail_url_template: Option<String>,
    #[builder(default = 64)]
    pub channel_capacity: usize,
}

impl Default for ScrapeOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Progress events emitted while a run is in flight.
#[derive(Debug, Clone)]
pub enum ScrapeEvent {
    QueryStarted {
        ordinal: usize,
        total: usize,
        query: String,
    },
    PageFetched {
        query: String,
        page: usize,
        records: usize,
        has_more: bool,
    },
    DetailFetched {
        docket: String,
        entries: usize,
    },
    QueryCompleted {
        query: String,
        pages: usize,
        records: usize,
    },
    QueryFailed {
        query: String,
        error: ScrapeError,
    },
    Completed {
        summary: ScrapeSummary,
        records: Vec<ResultRecord>,
    },
}

/// Totals for a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrapeSummary {
    pub queries: usize,
    pub queries_failed: usize,
    pub pages: usize,
    pub records: usize,
    pub entries: usize,
}

/// Error type shared across the scrape pipeline.
#[derive(Debug, Error, Clone)]
pub enum ScrapeError {
    #[error("invalid URL `{0}`")]
    InvalidUrl(String),
    #[error("failed to join `{path}` onto endpoint: {source}")]
    UrlJoin {
        path: String,
        #[source]
        source: Arc<ParseError>,
    },
    #[error("request error during `{stage}`: {source}")]
    Request {
        stage: &'static str,
        #[source]
        source: Arc<reqwest::Error>,
    },
    #[error("unexpected HTTP status {status} during `{stage}`")]
    HttpStatus { stage: &'static str, status: u16 },
    #[error("failed to read HTTP body during `{stage}`: {source}")]
    Body {
        stage: &'static str,
        #[source]
        source: Arc<reqwest::Error>,
    },
    #[error("parse error during `{stage}`: {message}")]
    Parse {
        stage: &'static str,
        message: String,
    },
    #[error("event channel closed unexpectedly")]
    ChannelClosed,
}

impl ScrapeError {
    pub fn request(stage: &'static str, error: reqwest::Error) -> Self {
        Self::Request {
            stage,
            source: Arc::new(error),
        }
    }

    pub fn body(stage: &'static str, error: reqwest::Error) -> Self {
        Self::Body {
            stage,
            source: Arc::new(error),
        }
    }

    pub fn parse(stage: &'static str, message: impl Into<String>) -> Self {
        Self::Parse {
            stage,
            message: message.into(),
        }
    }

    pub fn url_join(path: impl Into<String>, error: ParseError) -> Self {
        Self::UrlJoin {
            path: path.into(),
            source: Arc::new(error),
        }
    }
}
