//! Result page parsing: docket blocks, the refreshed session token and the
//! "more pages" decision. Works on both full pages and delta payloads.

use std::sync::OnceLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use tracing::{debug, trace, warn};
use url::Url;

use crate::scrape::delta;
use crate::scrape::session::{VIEWSTATE_FIELD, hidden_input_value};
use crate::scrape::types::{PageParseResult, ResultRecord, ScrapeError, SearchSession};

const BLOCK_MARKER: &str = "Docket for";
const TITLE_MARKER: &str = "Title:";
const TITLE_SEPARATOR: &str = " v. ";
const PAGE_LABEL_SELECTOR: &str = "#ctl00_ctl00_MainEditable_mainContent_lblCurrentPage";
const NEXT_BUTTON_SELECTOR: &str = "#ctl00_ctl00_MainEditable_mainContent_cmdNext";

/// How the parser decides whether another page exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum PaginationPolicy {
    /// `Page: X of Y` status label, more when `X < Y`. No label means no more pages.
    #[default]
    PageCount,
    /// Presence of the "Next" button.
    NextControl,
    /// Both signals must report another page.
    Agreement,
}

/// Static inputs the parser needs besides the markup itself.
#[derive(Debug, Clone)]
pub struct ParseContext {
    /// Base for resolving relative detail links (the form endpoint).
    pub base_url: Url,
    /// Fallback detail URL with an `{id}` placeholder.
    pub detail_url_template: Option<String>,
    pub policy: PaginationPolicy,
}

struct ResultSelectors {
    block: Selector,
    anchor: Selector,
    title_inline: Selector,
    title_cell: Selector,
    page_label: Selector,
    next_button: Selector,
}

impl ResultSelectors {
    fn new() -> Result<Self, ScrapeError> {
        Ok(Self {
            block: parse_selector("fieldset")?,
            anchor: parse_selector("a")?,
            title_inline: parse_selector("cc")?,
            title_cell: parse_selector("td")?,
            page_label: parse_selector(PAGE_LABEL_SELECTOR)?,
            next_button: parse_selector(NEXT_BUTTON_SELECTOR)?,
        })
    }
}

fn parse_selector(css: &str) -> Result<Selector, ScrapeError> {
    Selector::parse(css).map_err(|err| ScrapeError::parse("results_selectors", err.to_string()))
}

/// Parses one raw response into records, the next session token and the
/// pagination flag. `previous` is the session the response was requested with.
pub fn parse_results_page(
    raw: &str,
    previous: &SearchSession,
    ctx: &ParseContext,
) -> Result<PageParseResult, ScrapeError> {
    let document = Html::parse_document(raw);
    let selectors = ResultSelectors::new()?;

    let records = document
        .select(&selectors.block)
        .filter(|block| text_content(block).starts_with(BLOCK_MARKER))
        .map(|block| parse_block(&selectors, &block, ctx))
        .collect::<Vec<_>>();

    let next_token = extract_next_token(&document, raw);
    if next_token.is_empty() {
        warn!(
            stage = "token_refresh",
            had_previous = !previous.current_token.is_empty(),
            "response carried no session token; continuing with an empty one"
        );
    }

    let has_more = decide_has_more(&document, &selectors, ctx.policy);
    debug!(
        stage = "results_parsed",
        records = records.len(),
        has_more,
        token_len = next_token.len(),
        "parsed result page"
    );

    Ok(PageParseResult {
        records,
        next_token,
        has_more,
    })
}

fn parse_block(
    selectors: &ResultSelectors,
    block: &ElementRef<'_>,
    ctx: &ParseContext,
) -> ResultRecord {
    let anchor = block.select(&selectors.anchor).next();
    let id_source = anchor
        .map(|a| spaced_text(&a))
        .filter(|text| text.contains(BLOCK_MARKER))
        .unwrap_or_else(|| spaced_text(block));
    let id = extract_docket_id(&id_source);

    let href = anchor.and_then(|a| a.value().attr("href"));
    let detail_url = resolve_detail_url(href, id.as_deref(), ctx);

    let title = extract_title(selectors, block);
    let (petitioner, respondent) = split_title(&title);
    trace!(docket = ?id, %title, "parsed result block");

    ResultRecord {
        id,
        detail_url,
        petitioner: petitioner.to_string(),
        respondent: respondent.to_string(),
        title,
        entries: Vec::new(),
    }
}

/// Case identifier following the `Docket for` marker, up to whitespace or `*`.
pub fn extract_docket_id(text: &str) -> Option<String> {
    static DOCKET_RE: OnceLock<Regex> = OnceLock::new();
    let regex = DOCKET_RE
        .get_or_init(|| Regex::new(r"(?i)Docket for\s+([^\s*]+)").expect("docket regex compiles"));
    regex
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn resolve_detail_url(href: Option<&str>, id: Option<&str>, ctx: &ParseContext) -> String {
    if let Some(href) = href.map(str::trim).filter(|h| !h.is_empty()) {
        return match ctx.base_url.join(href) {
            Ok(url) => url.to_string(),
            Err(err) => {
                warn!(stage = "detail_link", href, error = %err, "unresolvable detail link");
                href.to_string()
            }
        };
    }
    match (id, ctx.detail_url_template.as_deref()) {
        (Some(id), Some(template)) => template.replace("{id}", id),
        _ => String::new(),
    }
}

type TitleStrategy = fn(&ResultSelectors, &ElementRef<'_>) -> Option<String>;

/// Tried in order; the first strategy whose element exists wins.
const TITLE_STRATEGIES: [(&str, TitleStrategy); 3] = [
    // precondition: a `<cc>` element inside the block; its inner markup is the title
    ("inline_element", title_from_inline),
    // precondition: a table cell inside the block; its text is the title
    ("first_cell", title_from_cell),
    // precondition: a literal `Title:` in the block markup, ended by a line break
    ("title_marker", title_from_marker),
];

fn extract_title(selectors: &ResultSelectors, block: &ElementRef<'_>) -> String {
    for (name, strategy) in TITLE_STRATEGIES {
        if let Some(raw) = strategy(selectors, block) {
            trace!(strategy = name, "title strategy matched");
            return clean_title(&raw);
        }
    }
    String::new()
}

fn title_from_inline(selectors: &ResultSelectors, block: &ElementRef<'_>) -> Option<String> {
    block
        .select(&selectors.title_inline)
        .next()
        .map(|el| el.inner_html())
}

fn title_from_cell(selectors: &ResultSelectors, block: &ElementRef<'_>) -> Option<String> {
    block
        .select(&selectors.title_cell)
        .next()
        .map(|el| el.text().collect::<String>())
}

fn title_from_marker(_: &ResultSelectors, block: &ElementRef<'_>) -> Option<String> {
    static TITLE_RE: OnceLock<Regex> = OnceLock::new();
    let regex = TITLE_RE.get_or_init(|| {
        Regex::new(r"(?is)Title:\s*(.*?)(?:<br|\n|$)").expect("title regex compiles")
    });
    let html = block.inner_html();
    regex
        .captures(&html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}

/// Strips tags and the `Title:` marker, decodes common entities, collapses whitespace.
pub fn clean_title(raw: &str) -> String {
    static TAG_RE: OnceLock<Regex> = OnceLock::new();
    let tags = TAG_RE.get_or_init(|| Regex::new(r"<[^>]+>").expect("tag regex compiles"));
    let stripped = tags.replace_all(raw, "");
    let without_marker = stripped.replacen(TITLE_MARKER, "", 1);
    collapse_whitespace(&decode_entities(&without_marker))
}

/// Splits on the first `" v. "`. Without the separator the whole title is the petitioner.
pub fn split_title(title: &str) -> (&str, &str) {
    title.split_once(TITLE_SEPARATOR).unwrap_or((title, ""))
}

fn extract_next_token(document: &Html, raw: &str) -> String {
    if let Some(token) =
        hidden_input_value(document, VIEWSTATE_FIELD).filter(|t| !t.trim().is_empty())
    {
        return token;
    }
    delta::hidden_field(raw, VIEWSTATE_FIELD).unwrap_or_default()
}

fn decide_has_more(document: &Html, selectors: &ResultSelectors, policy: PaginationPolicy) -> bool {
    match policy {
        PaginationPolicy::PageCount => page_count_has_more(document, selectors),
        PaginationPolicy::NextControl => next_control_present(document, selectors),
        PaginationPolicy::Agreement => {
            let by_count = page_count_has_more(document, selectors);
            let by_control = next_control_present(document, selectors);
            if by_count != by_control {
                warn!(
                    stage = "pagination",
                    by_count, by_control, "pagination signals disagree; stopping"
                );
            }
            by_count && by_control
        }
    }
}

fn page_count_has_more(document: &Html, selectors: &ResultSelectors) -> bool {
    document
        .select(&selectors.page_label)
        .next()
        .and_then(|label| page_position(&text_content(&label)))
        .is_some_and(|(current, total)| current < total)
}

fn next_control_present(document: &Html, selectors: &ResultSelectors) -> bool {
    document.select(&selectors.next_button).next().is_some()
}

/// `(current, total)` from a status like `43 items found. Page: 9 of 9 for your search`.
pub fn page_position(status: &str) -> Option<(usize, usize)> {
    static PAGE_RE: OnceLock<Regex> = OnceLock::new();
    let regex = PAGE_RE
        .get_or_init(|| Regex::new(r"(?i)Page:\s*(\d+)\s*of\s*(\d+)").expect("page regex compiles"));
    let caps = regex.captures(status)?;
    let current = caps.get(1)?.as_str().parse().ok()?;
    let total = caps.get(2)?.as_str().parse().ok()?;
    Some((current, total))
}

fn text_content(element: &ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Text nodes joined with spaces, so `<br>`-separated lines do not run together.
fn spaced_text(element: &ElementRef<'_>) -> String {
    element.text().collect::<Vec<_>>().join(" ")
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn decode_entities(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
