//! The two POST shapes accepted by the docket search form.

use async_trait::async_trait;

use crate::scrape::session::{VIEWSTATE_FIELD, VIEWSTATE_GENERATOR_FIELD};
use crate::scrape::types::{ScrapeError, SearchSession};

pub(crate) const SCRIPT_MANAGER_FIELD: &str = "ctl00$ctl00$RadScriptManager1";
pub(crate) const SCRIPT_MANAGER_TSM_FIELD: &str = "ctl00_ctl00_RadScriptManager1_TSM";
pub(crate) const SITE_SEARCH_FIELD: &str = "ctl00$ctl00$txtSearch";
pub(crate) const HIDDEN_BOX_FIELD: &str = "ctl00$ctl00$txbhidden";
pub(crate) const COLLECTION_FIELD: &str = "ct";
pub(crate) const COLLECTION_VALUE: &str = "Supreme-Court-Dockets";
pub(crate) const QUERY_FIELD: &str = "ctl00$ctl00$MainEditable$mainContent$txtQuery";
pub(crate) const SEARCH_BUTTON_FIELD: &str = "ctl00$ctl00$MainEditable$mainContent$cmdSearch";
pub(crate) const UPDATE_PANEL: &str = "ctl00$ctl00$MainEditable$mainContent$UpdatePanel1";
pub(crate) const NEXT_BUTTON: &str = "ctl00$ctl00$MainEditable$mainContent$cmdNext";
pub(crate) const EVENT_TARGET_FIELD: &str = "__EVENTTARGET";
pub(crate) const EVENT_ARGUMENT_FIELD: &str = "__EVENTARGUMENT";
pub(crate) const ASYNC_POST_FIELD: &str = "__ASYNCPOST";

pub type FormFields = Vec<(&'static str, String)>;

/// Transport for the search form. Implementations must keep cookies between calls.
#[async_trait]
pub trait FormTransport: Send + Sync {
    /// Loads the blank search page that seeds cookies and the session tokens.
    async fn load_search_page(&self) -> Result<String, ScrapeError>;

    /// Full-page search submission.
    async fn submit_search(
        &self,
        query: &str,
        session: &SearchSession,
    ) -> Result<String, ScrapeError>;

    /// Partial "next page" submission; the answer is a delta payload.
    async fn submit_next_page(
        &self,
        session: &SearchSession,
        query: &str,
    ) -> Result<String, ScrapeError>;
}

/// Field set for the initial search.
pub fn search_form(query: &str, session: &SearchSession) -> FormFields {
    vec![
        (SCRIPT_MANAGER_TSM_FIELD, String::new()),
        (SITE_SEARCH_FIELD, String::new()),
        (HIDDEN_BOX_FIELD, String::new()),
        (COLLECTION_FIELD, COLLECTION_VALUE.to_string()),
        (QUERY_FIELD, query.to_string()),
        (SEARCH_BUTTON_FIELD, "Search".to_string()),
        (EVENT_TARGET_FIELD, String::new()),
        (EVENT_ARGUMENT_FIELD, String::new()),
        (VIEWSTATE_FIELD, session.current_token.clone()),
        (VIEWSTATE_GENERATOR_FIELD, session.token_generator.clone()),
    ]
}

/// Field set for the "Next" control. The update panel and the button are named as
/// the async postback target.
pub fn next_page_form(session: &SearchSession, query: &str) -> FormFields {
    vec![
        (SCRIPT_MANAGER_FIELD, format!("{UPDATE_PANEL}|{NEXT_BUTTON}")),
        (SCRIPT_MANAGER_TSM_FIELD, String::new()),
        (EVENT_TARGET_FIELD, NEXT_BUTTON.to_string()),
        (EVENT_ARGUMENT_FIELD, String::new()),
        (SITE_SEARCH_FIELD, String::new()),
        (HIDDEN_BOX_FIELD, String::new()),
        (COLLECTION_FIELD, COLLECTION_VALUE.to_string()),
        (QUERY_FIELD, query.to_string()),
        (VIEWSTATE_FIELD, session.current_token.clone()),
        (VIEWSTATE_GENERATOR_FIELD, session.token_generator.clone()),
        (ASYNC_POST_FIELD, "true".to_string()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field<'a>(fields: &'a FormFields, name: &str) -> Option<&'a str> {
        fields
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }

    #[test]
    fn search_form_carries_query_and_tokens() {
        let session = SearchSession::new("VS1", "GEN");
        let fields = search_form("\"capital case\" \"Jan\" 2025", &session);

        assert_eq!(field(&fields, QUERY_FIELD), Some("\"capital case\" \"Jan\" 2025"));
        assert_eq!(field(&fields, SEARCH_BUTTON_FIELD), Some("Search"));
        assert_eq!(field(&fields, EVENT_TARGET_FIELD), Some(""));
        assert_eq!(field(&fields, VIEWSTATE_FIELD), Some("VS1"));
        assert_eq!(field(&fields, VIEWSTATE_GENERATOR_FIELD), Some("GEN"));
        assert_eq!(field(&fields, ASYNC_POST_FIELD), None);
    }

    #[test]
    fn next_page_form_targets_next_button() {
        let session = SearchSession::new("VS2", "GEN");
        let fields = next_page_form(&session, "q");

        assert_eq!(field(&fields, EVENT_TARGET_FIELD), Some(NEXT_BUTTON));
        assert_eq!(
            field(&fields, SCRIPT_MANAGER_FIELD),
            Some("ctl00$ctl00$MainEditable$mainContent$UpdatePanel1|ctl00$ctl00$MainEditable$mainContent$cmdNext")
        );
        assert_eq!(field(&fields, ASYNC_POST_FIELD), Some("true"));
        assert_eq!(field(&fields, VIEWSTATE_FIELD), Some("VS2"));
        assert_eq!(field(&fields, SEARCH_BUTTON_FIELD), None);
    }
}
