//! Decoding of the pipe-delimited partial-update ("delta") payload returned for async
//! postbacks. The payload is a run of `length|type|id|content|` segments where
//! `length` counts the characters of `content`.

const HIDDEN_FIELD: &str = "hiddenField";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeltaSegment<'a> {
    pub kind: &'a str,
    pub id: &'a str,
    pub content: &'a str,
}

/// Length-aware decode. `None` when the payload is not a well-formed delta.
pub fn parse_delta(raw: &str) -> Option<Vec<DeltaSegment<'_>>> {
    let mut rest = raw.trim_end_matches(['\r', '\n']);
    let mut segments = Vec::new();

    while !rest.is_empty() {
        let (len, tail) = rest.split_once('|')?;
        let len = len.trim().parse::<usize>().ok()?;
        let (kind, tail) = tail.split_once('|')?;
        let (id, tail) = tail.split_once('|')?;
        let end = byte_offset_of_char(tail, len)?;
        let content = &tail[..end];
        rest = tail[end..].strip_prefix('|')?;
        segments.push(DeltaSegment { kind, id, content });
    }

    if segments.is_empty() {
        None
    } else {
        Some(segments)
    }
}

/// Value of a `hiddenField` segment. Falls back to a plain token scan when the
/// length prefixes do not line up.
pub fn hidden_field(raw: &str, name: &str) -> Option<String> {
    if let Some(segments) = parse_delta(raw) {
        return segments
            .into_iter()
            .find(|segment| segment.kind == HIDDEN_FIELD && segment.id == name)
            .map(|segment| segment.content.to_string());
    }
    scan_hidden_field(raw, name)
}

fn scan_hidden_field(raw: &str, name: &str) -> Option<String> {
    let tokens: Vec<&str> = raw.split('|').collect();
    let mut found = None;
    let mut idx = 0;
    while idx < tokens.len() {
        if tokens[idx] == HIDDEN_FIELD && tokens.get(idx + 1).is_some_and(|t| !t.is_empty()) {
            if tokens[idx + 1] == name {
                found = Some(tokens.get(idx + 2).copied().unwrap_or_default().to_string());
            }
            idx += 3;
        } else {
            idx += 1;
        }
    }
    found
}

fn byte_offset_of_char(s: &str, chars: usize) -> Option<usize> {
    if chars == 0 {
        return Some(0);
    }
    let mut count = 0;
    for (idx, ch) in s.char_indices() {
        count += 1;
        if count == chars {
            return Some(idx + ch.len_utf8());
        }
    }
    None
}
