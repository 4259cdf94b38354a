//! End-to-end scrape against a mocked ASP.NET docket form.
//!
//! Covers the blank form load, the full-page search, the delta "next page"
//! postback, per-case detail pages and the CSV artifact.

use std::time::Duration;

use futures_util::{StreamExt, pin_mut};
use tempfile::TempDir;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_string_contains, header, method, path},
};

use docket_app::export::{EXPORT_FILE_NAME, to_csv, write_csv_export};
use docket_app::scrape::{DocketScraper, HttpSettings, ScrapeEvent, ScrapeOptions};

const FORM_PATH: &str = "/docket/docket.aspx";
const PAGE_LABEL_ID: &str = "ctl00_ctl00_MainEditable_mainContent_lblCurrentPage";

fn blank_form_html() -> String {
    r#"<html><body><form>
        <input type="hidden" name="__VIEWSTATE" id="__VIEWSTATE" value="T0" />
        <input type="hidden" name="__VIEWSTATEGENERATOR" id="__VIEWSTATEGENERATOR" value="GEN" />
        <input name="ctl00$ctl00$MainEditable$mainContent$txtQuery" />
    </form></body></html>"#
        .to_string()
}

fn result_block(id: &str, title: &str) -> String {
    format!(
        r#"<fieldset><a href="/docketfiles/{id}.htm">Docket for {id}</a><br>Title: {title}<br></fieldset>"#
    )
}

fn first_page_html(token: &str, current: usize, total: usize, blocks: &[String]) -> String {
    format!(
        r#"<html><body>
        <input type="hidden" name="__VIEWSTATE" value="{token}" />
        <span id="{PAGE_LABEL_ID}">Page: {current} of {total}</span>
        {}
        </body></html>"#,
        blocks.join("\n")
    )
}

fn delta_page(token: &str, current: usize, total: usize, blocks: &[String]) -> String {
    let panel = format!(
        r#"<span id="{PAGE_LABEL_ID}">Page: {current} of {total}</span>{}"#,
        blocks.join("")
    );
    format!(
        "{}|updatePanel|ctl00_ctl00_MainEditable_mainContent_UpdatePanel1|{panel}|{}|hiddenField|__VIEWSTATE|{token}|",
        panel.chars().count(),
        token.chars().count(),
    )
}

fn proceedings_table(rows: &[(&str, &str)]) -> String {
    let body: String = rows
        .iter()
        .map(|(date, text)| format!("<tr><td>{date}</td><td>{text}</td></tr>"))
        .collect();
    format!(
        r#"<html><body><table id="proceedings"><tr><th>Date</th><th>Proceedings and Orders</th></tr>{body}</table></body></html>"#
    )
}

fn scraper(server: &MockServer) -> DocketScraper {
    let settings = HttpSettings {
        timeout: Duration::from_secs(5),
        retries: 0,
        user_agent: "docket-e2e".to_string(),
    };
    let opts = ScrapeOptions::builder()
        .min_delay(Duration::ZERO)
        .max_delay(Duration::ZERO)
        .build();
    DocketScraper::http(&format!("{}{FORM_PATH}", server.uri()), &settings, opts)
        .expect("scraper builds")
}

async fn mount_blank_form(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(FORM_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(blank_form_html()))
        .mount(server)
        .await;
}

#[tokio::test]
async fn scrape_two_pages_and_export_csv() {
    let server = MockServer::start().await;
    mount_blank_form(&server).await;

    Mock::given(method("POST"))
        .and(path(FORM_PATH))
        .and(body_string_contains("cmdSearch=Search"))
        .and(body_string_contains("__VIEWSTATE=T0"))
        .and(body_string_contains("__VIEWSTATEGENERATOR=GEN"))
        .respond_with(ResponseTemplate::new(200).set_body_string(first_page_html(
            "TK1",
            1,
            2,
            &[
                result_block("16-5909", "Smith v. Jones"),
                result_block("17-100", "In re Application of Doe"),
            ],
        )))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(FORM_PATH))
        .and(header("x-microsoftajax", "Delta=true"))
        .and(header(
            "content-type",
            "application/x-www-form-urlencoded; charset=UTF-8",
        ))
        .and(body_string_contains("__VIEWSTATE=TK1"))
        .and(body_string_contains("__ASYNCPOST=true"))
        .respond_with(ResponseTemplate::new(200).set_body_string(delta_page(
            "TK2",
            2,
            2,
            &[result_block("18-1", "Roe v. Wade")],
        )))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/docketfiles/16-5909.htm"))
        .respond_with(ResponseTemplate::new(200).set_body_string(proceedings_table(&[
            ("Jan 05 2024", "Order issued"),
            ("Feb 12 2024", "Brief of respondent filed."),
        ])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/docketfiles/17-100.htm"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/docketfiles/18-1.htm"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<pre>~~~Date~~~ ~~~Proceedings and Orders~~~\nMar 3 2023\nPetition filed.\n<hr></pre>",
        ))
        .mount(&server)
        .await;

    let (records, summary) = scraper(&server)
        .run_queries(&["capital case".to_string()], Vec::new())
        .await;

    assert_eq!(summary.pages, 2);
    assert_eq!(summary.queries_failed, 0);
    let ids: Vec<_> = records.iter().filter_map(|r| r.id.as_deref()).collect();
    assert_eq!(ids, vec!["16-5909", "17-100", "18-1"]);
    assert_eq!(records[0].petitioner, "Smith");
    assert_eq!(records[0].respondent, "Jones");
    assert_eq!(records[0].entries.len(), 2);
    assert!(records[1].entries.is_empty());
    assert_eq!(records[1].petitioner, "In re Application of Doe");
    assert_eq!(records[2].entries[0].date, "03/03/2023");

    let csv = to_csv(&records).expect("csv renders");
    let out = TempDir::new().expect("temp dir");
    let written = write_csv_export(out.path(), &csv)
        .await
        .expect("export writes")
        .expect("non-empty export");
    assert_eq!(written, out.path().join(EXPORT_FILE_NAME));

    let content = std::fs::read_to_string(&written).expect("read export");
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 5);
    assert_eq!(
        lines[0],
        r#""id","title","petitioner","respondent","date","description","detail_url""#
    );
    assert!(lines[1].starts_with(r#""16-5909","Smith v. Jones","Smith","Jones","01/05/2024","Order issued","#));
    assert!(lines[3].starts_with(r#""17-100","In re Application of Doe","In re Application of Doe","","","","#));
}

#[tokio::test]
async fn unchanged_delta_ends_pagination_and_stream_completes() {
    let server = MockServer::start().await;
    mount_blank_form(&server).await;

    Mock::given(method("POST"))
        .and(path(FORM_PATH))
        .and(body_string_contains("cmdSearch=Search"))
        .respond_with(ResponseTemplate::new(200).set_body_string(first_page_html(
            "TK1",
            1,
            5,
            &[result_block("20-1", "A v. B")],
        )))
        .mount(&server)
        .await;

    // The server keeps answering with the same page even though the label says more exist.
    Mock::given(method("POST"))
        .and(path(FORM_PATH))
        .and(header("x-microsoftajax", "Delta=true"))
        .respond_with(ResponseTemplate::new(200).set_body_string(delta_page(
            "TK2",
            2,
            5,
            &[result_block("20-2", "C v. D")],
        )))
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/docketfiles/20-1.htm"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(proceedings_table(&[("Jan 05 2024", "Order issued")])),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/docketfiles/20-2.htm"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .mount(&server)
        .await;

    let stream = scraper(&server).scrape_stream(vec!["habeas".to_string()]);
    pin_mut!(stream);

    let mut pages = Vec::new();
    let mut completed = None;
    while let Some(event) = stream.next().await {
        match event.expect("stream event") {
            ScrapeEvent::PageFetched { page, .. } => pages.push(page),
            ScrapeEvent::Completed { summary, records } => completed = Some((summary, records)),
            _ => {}
        }
    }

    let (summary, records) = completed.expect("completion event");
    assert_eq!(pages, vec![1, 2]);
    assert_eq!(summary.pages, 2);
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].entries.len(), 1);
    assert!(records[1].entries.is_empty());
}
