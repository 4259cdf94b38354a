//! Query list generation: one search per recent calendar month.

use chrono::{Datelike, NaiveDate};

pub const DEFAULT_QUERY_TEMPLATE: &str = r#""capital case" "{month}" {year}"#;
pub const DEFAULT_MONTHS_BACK: usize = 6;

const MONTH_ABBREVIATIONS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];
const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Queries for `today`'s month and the `months` - 1 before it, newest first.
///
/// The template understands `{month}` (abbreviation), `{month_name}` and `{year}`.
pub fn recent_month_queries(today: NaiveDate, months: usize, template: &str) -> Vec<String> {
    let mut year = today.year();
    let mut month_idx = today.month0() as usize;
    let mut queries = Vec::with_capacity(months);

    for _ in 0..months {
        queries.push(render(template, month_idx, year));
        if month_idx == 0 {
            month_idx = 11;
            year -= 1;
        } else {
            month_idx -= 1;
        }
    }
    queries
}

fn render(template: &str, month_idx: usize, year: i32) -> String {
    template
        .replace("{month_name}", MONTH_NAMES[month_idx])
        .replace("{month}", MONTH_ABBREVIATIONS[month_idx])
        .replace("{year}", &year.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn six_months_wrap_into_previous_year() {
        let queries = recent_month_queries(date(2025, 2, 14), 6, DEFAULT_QUERY_TEMPLATE);
        assert_eq!(
            queries,
            vec![
                r#""capital case" "Feb" 2025"#,
                r#""capital case" "Jan" 2025"#,
                r#""capital case" "Dec" 2024"#,
                r#""capital case" "Nov" 2024"#,
                r#""capital case" "Oct" 2024"#,
                r#""capital case" "Sep" 2024"#,
            ]
        );
    }

    #[test]
    fn full_month_names_are_available() {
        let queries = recent_month_queries(date(2013, 1, 1), 1, r#""capital case" "{year}" {month_name}"#);
        assert_eq!(queries, vec![r#""capital case" "2013" January"#]);
    }

    #[test]
    fn zero_months_is_empty() {
        assert!(recent_month_queries(date(2024, 5, 1), 0, DEFAULT_QUERY_TEMPLATE).is_empty());
    }
}
