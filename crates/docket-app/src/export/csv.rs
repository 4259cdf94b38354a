//! Flattening enriched records into one CSV row per proceeding.

use std::collections::HashSet;

use csv::{QuoteStyle, Terminator, WriterBuilder};
use serde::Serialize;

use crate::export::ExportError;
use crate::scrape::types::ResultRecord;

pub const HEADER: [&str; 7] = [
    "id",
    "title",
    "petitioner",
    "respondent",
    "date",
    "description",
    "detail_url",
];

/// One `(record, entry)` pair, or a record with blank entry columns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct FlatRow {
    pub id: String,
    pub title: String,
    pub petitioner: String,
    pub respondent: String,
    pub date: String,
    pub description: String,
    pub detail_url: String,
}

impl FlatRow {
    fn parent(record: &ResultRecord) -> Self {
        Self {
            id: record.id.clone().unwrap_or_default(),
            title: record.title.clone(),
            petitioner: record.petitioner.clone(),
            respondent: record.respondent.clone(),
            date: String::new(),
            description: String::new(),
            detail_url: record.detail_url.clone(),
        }
    }
}

/// Rows in record order, then entry order. No deduplication here.
pub fn flatten(records: &[ResultRecord]) -> Vec<FlatRow> {
    let mut rows = Vec::new();
    for record in records {
        let parent = FlatRow::parent(record);
        if record.entries.is_empty() {
            rows.push(parent);
            continue;
        }
        rows.extend(record.entries.iter().map(|entry| FlatRow {
            date: entry.date.clone(),
            description: entry.description.clone(),
            ..parent.clone()
        }));
    }
    rows
}

/// Renders the export document. Every field is quoted and repeated rows are
/// written once; no records yields an empty string.
pub fn to_csv(records: &[ResultRecord]) -> Result<String, ExportError> {
    if records.is_empty() {
        return Ok(String::new());
    }

    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .quote_style(QuoteStyle::Always)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record(HEADER)?;

    let mut seen = HashSet::new();
    for row in flatten(records) {
        if seen.insert(row.clone()) {
            writer.serialize(&row)?;
        }
    }

    let bytes = writer
        .into_inner()
        .map_err(|err| ExportError::Flush(err.error().to_string()))?;
    String::from_utf8(bytes).map_err(|err| ExportError::Encoding(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrape::types::DetailEntry;

    fn record(id: &str, entries: Vec<DetailEntry>) -> ResultRecord {
        ResultRecord {
            id: Some(id.to_string()),
            detail_url: format!("https://court.example/docket/{id}.htm"),
            title: "Smith v. Jones".to_string(),
            petitioner: "Smith".to_string(),
            respondent: "Jones".to_string(),
            entries,
        }
    }

    #[test]
    fn record_without_entries_yields_one_blank_row() {
        let rows = flatten(&[record("16-5909", Vec::new())]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].date, "");
        assert_eq!(rows[0].description, "");
        assert_eq!(rows[0].id, "16-5909");
    }

    #[test]
    fn k_entries_yield_k_rows_sharing_parent_fields() {
        let entries = vec![
            DetailEntry::new("01/05/2024", "Order issued"),
            DetailEntry::new("02/01/2024", "Brief filed"),
            DetailEntry::new("03/01/2024", "Judgment issued"),
        ];
        let rows = flatten(&[record("1-1", entries)]);
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|row| row.id == "1-1" && row.petitioner == "Smith"));
        assert_eq!(rows[2].description, "Judgment issued");
    }

    #[test]
    fn identical_entries_are_written_once() {
        let entry = DetailEntry::new("01/05/2024", "Order issued");
        let csv = to_csv(&[record("1-1", vec![entry.clone(), entry.clone(), entry])]).unwrap();
        assert_eq!(csv.lines().count(), 2);
    }

    #[test]
    fn output_quotes_every_field_and_doubles_quotes() {
        let mut rec = record("16-5909", vec![DetailEntry::new("01/05/2024", r#"Motion "to dismiss""#)]);
        rec.title = "Smith, Jr. v. Jones".to_string();
        let csv = to_csv(&[rec]).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some(r#""id","title","petitioner","respondent","date","description","detail_url""#)
        );
        assert_eq!(
            lines.next(),
            Some(
                r#""16-5909","Smith, Jr. v. Jones","Smith","Jones","01/05/2024","Motion ""to dismiss""","https://court.example/docket/16-5909.htm""#
            )
        );
        assert!(csv.ends_with('\n'));
    }

    #[test]
    fn no_records_renders_nothing() {
        assert_eq!(to_csv(&[]).unwrap(), "");
    }

    #[test]
    fn missing_id_exports_as_blank() {
        let mut rec = record("x", Vec::new());
        rec.id = None;
        assert_eq!(flatten(&[rec])[0].id, "");
    }
}
