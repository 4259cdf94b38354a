//! Search-form scraping: session tokens, result pages, pagination and
//! per-case proceedings.

pub mod client;
pub mod delta;
pub mod detail;
pub mod driver;
pub mod form;
pub mod queries;
pub mod results;
pub mod session;
pub mod types;

pub use client::{HttpClient, HttpSettings};
pub use detail::{DocumentFetcher, extract_entries, fetch_entries, format_date};
pub use driver::DocketScraper;
pub use form::FormTransport;
pub use queries::{DEFAULT_MONTHS_BACK, DEFAULT_QUERY_TEMPLATE, recent_month_queries};
pub use results::{PaginationPolicy, ParseContext, parse_results_page, split_title};
pub use session::extract_session;
pub use types::{
    DetailEntry, PageParseResult, ResultRecord, ScrapeError, ScrapeEvent, ScrapeOptions,
    ScrapeSummary, SearchSession,
};
