//! HTTP transport for the search form and the per-case detail pages.

use std::{future::Future, time::Duration};

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use reqwest::{
    Client, Url,
    header::{self, HeaderMap, HeaderValue},
};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::scrape::detail::DocumentFetcher;
use crate::scrape::form::{FormFields, FormTransport, next_page_form, search_form};
use crate::scrape::types::{ScrapeError, SearchSession};

pub(crate) const SOURCE_SLUG: &str = "scotus-docket";
const FULL_PAGE_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const DELTA_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=UTF-8";

/// Connection settings for [`HttpClient`].
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub timeout: Duration,
    pub retries: usize,
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retries: 2,
            user_agent: format!("docket-scraper/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Cookie-carrying HTTP client for the search form and the detail pages.
#[derive(Debug, Clone)]
pub struct HttpClient {
    endpoint: Url,
    http: Client,
    backoff: ExponentialBuilder,
}

impl HttpClient {
    pub fn new(endpoint: &str, settings: &HttpSettings) -> Result<Self, ScrapeError> {
        let endpoint =
            Url::parse(endpoint).map_err(|_| ScrapeError::InvalidUrl(endpoint.to_string()))?;

        let http = Client::builder()
            .cookie_store(true)
            .timeout(settings.timeout)
            .user_agent(settings.user_agent.as_str())
            .build()
            .map_err(|err| ScrapeError::request("build_client", err))?;

        let backoff = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(250))
            .with_max_delay(Duration::from_secs(5))
            .with_max_times(settings.retries)
            .with_jitter();

        Ok(Self {
            endpoint,
            http,
            backoff,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn with_retry<T, F, Fut>(&self, stage: &'static str, attempt: F) -> Result<T, ScrapeError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ScrapeError>>,
    {
        attempt
            .retry(self.backoff.clone())
            .sleep(sleep)
            .notify(|err: &ScrapeError, delay: Duration| {
                warn!(
                    source = SOURCE_SLUG,
                    stage,
                    delay_ms = delay.as_millis(),
                    error = %err,
                    "retrying request"
                );
            })
            .await
    }

    async fn post_form(
        &self,
        stage: &'static str,
        form: FormFields,
        headers: HeaderMap,
    ) -> Result<String, ScrapeError> {
        let http = &self.http;
        let url = &self.endpoint;
        let form = &form;
        let headers = &headers;
        let attempt = move || async move {
            let response = http
                .post(url.clone())
                .form(form)
                .headers(headers.clone())
                .send()
                .await
                .map_err(|err| ScrapeError::request(stage, err))?;
            read_text(stage, response).await
        };
        let body = self.with_retry(stage, attempt).await?;
        debug!(source = SOURCE_SLUG, stage, bytes = body.len(), "form response received");
        Ok(body)
    }

    async fn get_text(&self, stage: &'static str, url: Url) -> Result<String, ScrapeError> {
        let http = &self.http;
        let url = &url;
        let attempt = move || async move {
            let response = http
                .get(url.clone())
                .send()
                .await
                .map_err(|err| ScrapeError::request(stage, err))?;
            read_text(stage, response).await
        };
        self.with_retry(stage, attempt).await
    }

    fn referer(&self) -> HeaderValue {
        HeaderValue::from_str(self.endpoint.as_str())
            .unwrap_or_else(|_| HeaderValue::from_static(""))
    }
}

async fn read_text(stage: &'static str, response: reqwest::Response) -> Result<String, ScrapeError> {
    let status = response.status();
    if !status.is_success() {
        return Err(ScrapeError::HttpStatus {
            stage,
            status: status.as_u16(),
        });
    }
    response
        .text()
        .await
        .map_err(|err| ScrapeError::body(stage, err))
}

#[async_trait]
impl FormTransport for HttpClient {
    async fn load_search_page(&self) -> Result<String, ScrapeError> {
        self.get_text("search_page", self.endpoint.clone()).await
    }

    async fn submit_search(
        &self,
        query: &str,
        session: &SearchSession,
    ) -> Result<String, ScrapeError> {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static(FULL_PAGE_ACCEPT));
        headers.insert(header::REFERER, self.referer());
        self.post_form("search_submit", search_form(query, session), headers)
            .await
    }

    async fn submit_next_page(
        &self,
        session: &SearchSession,
        query: &str,
    ) -> Result<String, ScrapeError> {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static("*/*"));
        headers.insert(header::REFERER, self.referer());
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(DELTA_CONTENT_TYPE),
        );
        headers.insert("x-microsoftajax", HeaderValue::from_static("Delta=true"));
        headers.insert("x-requested-with", HeaderValue::from_static("XMLHttpRequest"));
        self.post_form("next_page", next_page_form(session, query), headers)
            .await
    }
}

#[async_trait]
impl DocumentFetcher for HttpClient {
    async fn fetch_document(&self, url: &str) -> Result<String, ScrapeError> {
        let target = self
            .endpoint
            .join(url)
            .map_err(|err| ScrapeError::url_join(url, err))?;
        self.get_text("detail_page", target).await
    }
}
