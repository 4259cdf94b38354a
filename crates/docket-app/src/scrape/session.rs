//! Hidden form state carried between submissions.

use scraper::{Html, Selector};
use tracing::debug;

use crate::scrape::types::SearchSession;

pub(crate) const VIEWSTATE_FIELD: &str = "__VIEWSTATE";
pub(crate) const VIEWSTATE_GENERATOR_FIELD: &str = "__VIEWSTATEGENERATOR";

/// Reads the session tokens from a full page. Missing fields become empty strings;
/// the server then answers with an empty result set, which ends pagination on its own.
pub fn extract_session(markup: &str) -> SearchSession {
    let document = Html::parse_document(markup);
    let current_token = hidden_input_value(&document, VIEWSTATE_FIELD).unwrap_or_default();
    let token_generator =
        hidden_input_value(&document, VIEWSTATE_GENERATOR_FIELD).unwrap_or_default();

    debug!(
        stage = "session_extract",
        token_len = current_token.len(),
        has_generator = !token_generator.is_empty(),
        "extracted form session"
    );

    SearchSession {
        current_token,
        token_generator,
    }
}

/// Value of `input[name=<name>]`, if the element exists and carries a value.
pub(crate) fn hidden_input_value(document: &Html, name: &str) -> Option<String> {
    let selector = Selector::parse(&format!("input[name='{name}']")).ok()?;
    document
        .select(&selector)
        .next()
        .and_then(|input| input.value().attr("value"))
        .map(str::to_string)
}
