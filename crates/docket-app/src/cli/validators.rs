/// Validate month count: 1..=120.
pub fn validate_months(s: &str) -> Result<usize, String> {
    let months: usize = s
        .parse()
        .map_err(|_| format!("not a whole number of months: {s}"))?;
    if !(1..=120).contains(&months) {
        return Err(format!("months must be between 1 and 120, got {months}"));
    }
    Ok(months)
}

/// Validate page bound: at least one page.
pub fn validate_max_pages(s: &str) -> Result<usize, String> {
    let pages: usize = s
        .parse()
        .map_err(|_| format!("not a whole number of pages: {s}"))?;
    if pages == 0 {
        return Err("max pages must be at least 1".to_string());
    }
    Ok(pages)
}

/// Validate search text: non-blank after trimming.
pub fn validate_query(s: &str) -> Result<String, String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err("query cannot be empty".to_string());
    }
    Ok(trimmed.to_string())
}
