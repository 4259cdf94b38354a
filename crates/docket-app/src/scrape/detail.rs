//! Per-case proceedings: fetching the detail page and pulling its dated entries.

use async_trait::async_trait;
use scraper::{Html, Selector};
use tracing::{debug, trace, warn};

use crate::scrape::types::{DetailEntry, ScrapeError};

const PROCEEDINGS_SELECTOR: &str = "#proceedings";
const DATE_MARKER: &str = "~~~Date~~~";
const BLOCK_END_MARKER: &str = "<hr";

/// Loads a URL and hands back the resulting document markup.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    async fn fetch_document(&self, url: &str) -> Result<String, ScrapeError>;
}

/// Fetches and extracts entries for one case. Failures are logged and yield no
/// entries so a single broken page never stops the run.
pub async fn fetch_entries(fetcher: &dyn DocumentFetcher, url: &str) -> Vec<DetailEntry> {
    if url.is_empty() {
        warn!(stage = "detail_fetch", "record has no detail link; skipping");
        return Vec::new();
    }
    match fetcher.fetch_document(url).await {
        Ok(markup) => {
            let entries = extract_entries(&markup);
            debug!(stage = "detail_parsed", url, entries = entries.len(), "extracted proceedings");
            entries
        }
        Err(err) => {
            warn!(stage = "detail_fetch", url, error = %err, "detail page unavailable");
            Vec::new()
        }
    }
}

type EntryStrategy = fn(&str) -> Option<Vec<DetailEntry>>;

/// Tried in order; a strategy returns `None` when its precondition does not hold.
const ENTRY_STRATEGIES: [(&str, EntryStrategy); 2] = [
    // precondition: an element with id `proceedings` exists
    ("proceedings_table", entries_from_table),
    // precondition: the literal `~~~Date~~~` occurs in the raw markup
    ("date_marker_block", entries_from_marker_block),
];

/// Chronological entries of a detail page, in document order.
pub fn extract_entries(markup: &str) -> Vec<DetailEntry> {
    for (name, strategy) in ENTRY_STRATEGIES {
        if let Some(entries) = strategy(markup) {
            trace!(strategy = name, entries = entries.len(), "entry strategy matched");
            return entries;
        }
    }
    debug!(stage = "detail_parsed", "no proceedings found on detail page");
    Vec::new()
}

fn entries_from_table(markup: &str) -> Option<Vec<DetailEntry>> {
    let document = Html::parse_document(markup);
    let table_sel = Selector::parse(PROCEEDINGS_SELECTOR).ok()?;
    let row_sel = Selector::parse("tr").ok()?;
    let cell_sel = Selector::parse("td").ok()?;

    let table = document.select(&table_sel).next()?;
    let entries = table
        .select(&row_sel)
        .skip(1)
        .filter_map(|row| {
            let cells: Vec<String> = row
                .select(&cell_sel)
                .map(|cell| collapse_whitespace(&cell.text().collect::<String>()))
                .collect();
            if cells.len() < 2 {
                return None;
            }
            let date = format_date(&cells[0]);
            let description = cells[1].clone();
            (!date.is_empty() && !description.is_empty())
                .then(|| DetailEntry::new(date, description))
        })
        .collect();
    Some(entries)
}

fn entries_from_marker_block(markup: &str) -> Option<Vec<DetailEntry>> {
    let start = markup.find(DATE_MARKER)?;
    let end = markup[start..]
        .find(BLOCK_END_MARKER)
        .map_or(markup.len(), |offset| start + offset);

    let mut lines: Vec<String> = markup[start..end]
        .lines()
        .map(|line| strip_tags(line).trim().to_string())
        .filter(|line| !line.is_empty())
        .collect();
    if lines.first().is_some_and(|line| line.contains(DATE_MARKER)) {
        lines.remove(0);
    }

    let entries = lines
        .chunks_exact(2)
        .map(|pair| DetailEntry::new(format_date(&pair[0]), pair[1].clone()))
        .collect();
    Some(entries)
}

/// `Jan 05 2024` → `01/05/2024`. Unknown months map to `00`; anything with fewer
/// than three parts is returned unchanged.
pub fn format_date(raw: &str) -> String {
    let parts: Vec<&str> = raw.split_whitespace().collect();
    if parts.len() < 3 {
        return raw.trim().to_string();
    }
    let month = month_number(parts[0]);
    let day = parts[1].trim_end_matches(',');
    format!("{month}/{day:0>2}/{}", parts[2])
}

fn month_number(abbrev: &str) -> &'static str {
    match abbrev.to_ascii_lowercase().as_str() {
        "jan" => "01",
        "feb" => "02",
        "mar" => "03",
        "apr" => "04",
        "may" => "05",
        "jun" => "06",
        "jul" => "07",
        "aug" => "08",
        "sep" => "09",
        "oct" => "10",
        "nov" => "11",
        "dec" => "12",
        _ => "00",
    }
}

fn strip_tags(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut in_tag = false;
    for ch in line.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
