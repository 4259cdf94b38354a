//! Per-query pagination state machine and the outer loop over queries.

use std::{sync::Arc, time::Duration};

use async_stream::try_stream;
use futures_util::stream::Stream;
use rand::Rng;
use tokio::{sync::mpsc, time::sleep};
use tracing::{debug, info, warn};

use crate::scrape::client::{HttpClient, HttpSettings, SOURCE_SLUG};
use crate::scrape::detail::{DocumentFetcher, fetch_entries};
use crate::scrape::form::FormTransport;
use crate::scrape::results::{ParseContext, parse_results_page};
use crate::scrape::session::extract_session;
use crate::scrape::types::{
    PageParseResult, ResultRecord, ScrapeError, ScrapeEvent, ScrapeOptions, ScrapeSummary,
    SearchSession,
};

enum EventMessage {
    Event(ScrapeEvent),
    Error(ScrapeError),
}

type EventSender = mpsc::Sender<EventMessage>;

async fn send_event(sender: Option<&EventSender>, event: ScrapeEvent) -> Result<(), ScrapeError> {
    let Some(sender) = sender else {
        return Ok(());
    };
    sender
        .send(EventMessage::Event(event))
        .await
        .map_err(|_| ScrapeError::ChannelClosed)
}

/// Drives the search form for a list of queries and enriches every hit with its
/// proceedings.
#[derive(Clone)]
pub struct DocketScraper {
    form: Arc<dyn FormTransport>,
    fetcher: Arc<dyn DocumentFetcher>,
    ctx: ParseContext,
    opts: ScrapeOptions,
}

/// Outcome of one query's pagination loop.
#[derive(Debug, Default)]
struct QueryOutcome {
    pages: usize,
    records: Vec<ResultRecord>,
}

impl DocketScraper {
    pub fn new(
        form: Arc<dyn FormTransport>,
        fetcher: Arc<dyn DocumentFetcher>,
        base_url: url::Url,
        opts: ScrapeOptions,
    ) -> Self {
        let ctx = ParseContext {
            base_url,
            detail_url_template: opts.detail_url_template.clone(),
            policy: opts.pagination,
        };
        Self {
            form,
            fetcher,
            ctx,
            opts,
        }
    }

    /// Scraper over HTTP: one cookie-carrying client for the form and detail pages.
    pub fn http(
        endpoint: &str,
        settings: &HttpSettings,
        opts: ScrapeOptions,
    ) -> Result<Self, ScrapeError> {
        let client = Arc::new(HttpClient::new(endpoint, settings)?);
        let base_url = client.endpoint().clone();
        Ok(Self::new(client.clone(), client, base_url, opts))
    }

    /// Runs all queries on a background task and reports progress as a stream. The
    /// last item is [`ScrapeEvent::Completed`] carrying every collected record.
    pub fn scrape_stream(
        &self,
        queries: Vec<String>,
    ) -> impl Stream<Item = Result<ScrapeEvent, ScrapeError>> + use<> {
        let capacity = self.opts.channel_capacity.max(1);
        let (event_tx, event_rx) = mpsc::channel(capacity);
        let scraper = self.clone();
        tokio::spawn(async move {
            if let Err(err) = scraper.run_to_completion(queries, &event_tx).await {
                let _ = event_tx.send(EventMessage::Error(err)).await;
            }
        });

        try_stream! {
            let mut rx = event_rx;
            while let Some(message) = rx.recv().await {
                match message {
                    EventMessage::Event(event) => yield event,
                    EventMessage::Error(err) => Err(err)?,
                }
            }
        }
    }

    async fn run_to_completion(
        &self,
        queries: Vec<String>,
        event_tx: &EventSender,
    ) -> Result<(), ScrapeError> {
        let mut records = Vec::new();
        let mut summary = ScrapeSummary::default();
        self.drive_queries(&queries, &mut records, &mut summary, Some(event_tx))
            .await?;
        send_event(Some(event_tx), ScrapeEvent::Completed { summary, records }).await
    }

    /// Runs every query in order, appending to `collected` and handing it back.
    pub async fn run_queries(
        &self,
        queries: &[String],
        mut collected: Vec<ResultRecord>,
    ) -> (Vec<ResultRecord>, ScrapeSummary) {
        let mut summary = ScrapeSummary::default();
        if let Err(err) = self
            .drive_queries(queries, &mut collected, &mut summary, None)
            .await
        {
            warn!(source = SOURCE_SLUG, stage = "query_loop", error = %err, "query loop ended early");
        }
        (collected, summary)
    }

    /// Outer loop. Only a closed event channel ends it early; whatever was
    /// collected up to that point stays in `collected`.
    async fn drive_queries(
        &self,
        queries: &[String],
        collected: &mut Vec<ResultRecord>,
        summary: &mut ScrapeSummary,
        events: Option<&EventSender>,
    ) -> Result<(), ScrapeError> {
        let total = queries.len();
        summary.queries = total;

        for (idx, query) in queries.iter().enumerate() {
            info!(
                source = SOURCE_SLUG,
                stage = "query_start",
                ordinal = idx + 1,
                total,
                query = %query,
                "running search"
            );
            send_event(
                events,
                ScrapeEvent::QueryStarted {
                    ordinal: idx + 1,
                    total,
                    query: query.clone(),
                },
            )
            .await?;

            match self.run_query(query, events).await {
                Ok(outcome) => {
                    summary.pages += outcome.pages;
                    summary.records += outcome.records.len();
                    summary.entries += outcome
                        .records
                        .iter()
                        .map(|r| r.entries.len())
                        .sum::<usize>();
                    info!(
                        source = SOURCE_SLUG,
                        stage = "query_done",
                        query = %query,
                        pages = outcome.pages,
                        records = outcome.records.len(),
                        "search finished"
                    );
                    send_event(
                        events,
                        ScrapeEvent::QueryCompleted {
                            query: query.clone(),
                            pages: outcome.pages,
                            records: outcome.records.len(),
                        },
                    )
                    .await?;
                    collected.extend(outcome.records);
                }
                Err(ScrapeError::ChannelClosed) => return Err(ScrapeError::ChannelClosed),
                Err(err) => {
                    summary.queries_failed += 1;
                    warn!(
                        source = SOURCE_SLUG,
                        stage = "query_failed",
                        query = %query,
                        error = %err,
                        "search failed; continuing with next query"
                    );
                    send_event(
                        events,
                        ScrapeEvent::QueryFailed {
                            query: query.clone(),
                            error: err,
                        },
                    )
                    .await?;
                }
            }
        }

        Ok(())
    }

    async fn run_query(
        &self,
        query: &str,
        events: Option<&EventSender>,
    ) -> Result<QueryOutcome, ScrapeError> {
        let search_page = self.form.load_search_page().await?;
        let session = extract_session(&search_page);

        let first = match self.form.submit_search(query, &session).await {
            Ok(raw) => raw,
            Err(err) => {
                warn!(
                    source = SOURCE_SLUG,
                    stage = "search_submit",
                    query,
                    error = %err,
                    "search submission failed; treating as no results"
                );
                return Ok(QueryOutcome::default());
            }
        };
        if first.trim().is_empty() {
            debug!(source = SOURCE_SLUG, stage = "search_submit", query, "empty search response");
            return Ok(QueryOutcome::default());
        }

        let mut outcome = QueryOutcome::default();
        let mut page = self.parse_page(&first, &session);
        outcome.pages = 1;
        self.collect_page(query, 1, &page, &mut outcome.records, events)
            .await?;

        let mut last_raw = first;
        let mut session = session.advance(std::mem::take(&mut page.next_token));

        while page.has_more {
            if outcome.pages >= self.opts.max_pages {
                info!(
                    source = SOURCE_SLUG,
                    stage = "page_bound",
                    query,
                    max_pages = self.opts.max_pages,
                    "page bound reached; stopping"
                );
                break;
            }

            sleep(self.next_delay()).await;

            let raw = match self.form.submit_next_page(&session, query).await {
                Ok(raw) => raw,
                Err(err) => {
                    warn!(
                        source = SOURCE_SLUG,
                        stage = "next_page",
                        query,
                        page = outcome.pages + 1,
                        error = %err,
                        "next page request failed; ending pagination"
                    );
                    break;
                }
            };
            if raw.trim().is_empty() || raw == last_raw {
                debug!(
                    source = SOURCE_SLUG,
                    stage = "next_page",
                    query,
                    "no more pages or content unchanged"
                );
                break;
            }

            page = self.parse_page(&raw, &session);
            outcome.pages += 1;
            self.collect_page(query, outcome.pages, &page, &mut outcome.records, events)
                .await?;

            last_raw = raw;
            session = session.advance(std::mem::take(&mut page.next_token));
        }

        Ok(outcome)
    }

    fn parse_page(&self, raw: &str, session: &SearchSession) -> PageParseResult {
        parse_results_page(raw, session, &self.ctx).unwrap_or_else(|err| {
            warn!(
                source = SOURCE_SLUG,
                stage = "results_parse",
                error = %err,
                "result page could not be parsed"
            );
            PageParseResult::default()
        })
    }

    /// Enriches the page's records one at a time and appends them in page order.
    async fn collect_page(
        &self,
        query: &str,
        page_no: usize,
        page: &PageParseResult,
        out: &mut Vec<ResultRecord>,
        events: Option<&EventSender>,
    ) -> Result<(), ScrapeError> {
        send_event(
            events,
            ScrapeEvent::PageFetched {
                query: query.to_string(),
                page: page_no,
                records: page.records.len(),
                has_more: page.has_more,
            },
        )
        .await?;

        for record in &page.records {
            let Some(docket) = record.id.clone() else {
                warn!(
                    source = SOURCE_SLUG,
                    stage = "record_skip",
                    title = %record.title,
                    "could not extract docket id; dropping result"
                );
                continue;
            };

            let entries = fetch_entries(self.fetcher.as_ref(), &record.detail_url).await;
            send_event(
                events,
                ScrapeEvent::DetailFetched {
                    docket,
                    entries: entries.len(),
                },
            )
            .await?;

            out.push(ResultRecord {
                entries,
                ..record.clone()
            });
        }
        Ok(())
    }

    fn next_delay(&self) -> Duration {
        jittered_delay(self.opts.min_delay, self.opts.max_delay)
    }
}

/// Uniform delay in `[min, max]`; an inverted window collapses to `min`.
pub fn jittered_delay(min: Duration, max: Duration) -> Duration {
    if max <= min {
        return min;
    }
    let min_ms = min.as_millis() as u64;
    let max_ms = max.as_millis() as u64;
    Duration::from_millis(rand::thread_rng().gen_range(min_ms..=max_ms))
}
