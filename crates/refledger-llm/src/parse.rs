//! Turning raw model output into [`ExtractedReference`]s.
//!
//! The model is asked for strict JSON but does not always deliver it.
//! Parsing applies a fixed recovery ladder: (a) close any unterminated
//! brackets/braces and re-parse (truncated output), (b) regex-extract the
//! first bracketed array literal, (c) give up. The parsed value may be a
//! bare array or an object holding the array under `references` or
//! `items`. Entry keys are normalized through an explicit mapping table so
//! the canonical record type stays strict.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::ExtractedReference;

/// Accepted key spellings for each canonical field, checked in order.
const FIELD_KEYS: &[(&str, &[&str])] = &[
    ("citation_key", &["citationKey", "citation_key", "key"]),
    ("first_author", &["firstAuthor", "first_author"]),
    ("other_authors", &["otherAuthors", "other_authors"]),
    ("title", &["title"]),
    ("year", &["year"]),
    (
        "publisher_journal",
        &["publisherJournal", "publisher_journal", "journal", "publisher"],
    ),
    ("volume_issue", &["volumeIssue", "volume_issue"]),
    ("pages", &["pages"]),
    ("extra_notes", &["extraNotes", "extra_notes", "notes"]),
    ("isbn", &["isbn", "ISBN"]),
    ("reference_raw", &["referenceRaw", "reference_raw", "raw"]),
];

static ARRAY_LITERAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\[.*\]").expect("valid regex"));

/// Parse raw model output into normalized, post-filtered references.
///
/// Returns `Err` only when the recovery ladder is exhausted. An empty
/// entry list is not an error here; the orchestrator decides what an
/// empty extraction means.
pub fn parse_references(raw: &str) -> Result<Vec<ExtractedReference>, String> {
    let value = parse_json_with_recovery(raw)?;
    let entries = entry_array(&value)
        .ok_or_else(|| "model output is neither an array nor a references object".to_string())?;

    Ok(entries.iter().filter_map(normalize_entry).collect())
}

/// The recovery ladder.
fn parse_json_with_recovery(raw: &str) -> Result<Value, String> {
    let cleaned = strip_code_fences(raw);

    if let Ok(v) = serde_json::from_str::<Value>(cleaned) {
        return Ok(v);
    }

    // (a) Truncated output: append the missing closers and retry.
    let repaired = close_unterminated(cleaned);
    if let Ok(v) = serde_json::from_str::<Value>(&repaired) {
        tracing::debug!("recovered truncated model JSON by appending closers");
        return Ok(v);
    }

    // (b) Prose around the payload: extract the first array literal.
    if let Some(m) = ARRAY_LITERAL_RE.find(cleaned) {
        if let Ok(v) = serde_json::from_str::<Value>(m.as_str()) {
            tracing::debug!("recovered model JSON via embedded array literal");
            return Ok(v);
        }
    }

    Err(format!(
        "unparseable JSON after recovery (first 120 chars: {:?})",
        cleaned.chars().take(120).collect::<String>()
    ))
}

/// Models often wrap JSON in a markdown fence even when told not to.
fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop an optional language tag on the opening fence line.
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.trim_start_matches(['\r', '\n']);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Append closing brackets/braces for every container still open at the
/// end of the input. String and escape state is tracked so brackets inside
/// string values don't count.
fn close_unterminated(s: &str) -> String {
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for c in s.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '[' => stack.push(']'),
            '{' => stack.push('}'),
            ']' | '}' => {
                if stack.last() == Some(&c) {
                    stack.pop();
                }
            }
            _ => {}
        }
    }

    let mut out = String::from(s.trim_end());
    // A string cut off mid-value needs its quote closed first.
    if in_string {
        out.push('"');
    }
    // Trailing comma before a closer is invalid JSON.
    while out.ends_with(',') {
        out.pop();
    }
    while let Some(closer) = stack.pop() {
        out.push(closer);
    }
    out
}

/// Accept a bare array, or an object with the array under `references` or
/// `items`.
fn entry_array(value: &Value) -> Option<&Vec<Value>> {
    if let Some(arr) = value.as_array() {
        return Some(arr);
    }
    value["references"]
        .as_array()
        .or_else(|| value["items"].as_array())
}

/// Map one JSON entry to the canonical field set, then post-filter.
///
/// Dropped entries: no citation key, a citation key containing the literal
/// word "unknown", or neither a title nor a first author.
fn normalize_entry(entry: &Value) -> Option<ExtractedReference> {
    let obj = entry.as_object()?;

    let mut reference = ExtractedReference::default();
    for (canonical, variants) in FIELD_KEYS {
        let text = variants
            .iter()
            .find_map(|k| obj.get(*k))
            .map(value_to_string)
            .unwrap_or_default();
        let slot = match *canonical {
            "citation_key" => &mut reference.citation_key,
            "first_author" => &mut reference.first_author,
            "other_authors" => &mut reference.other_authors,
            "title" => &mut reference.title,
            "year" => &mut reference.year,
            "publisher_journal" => &mut reference.publisher_journal,
            "volume_issue" => &mut reference.volume_issue,
            "pages" => &mut reference.pages,
            "extra_notes" => &mut reference.extra_notes,
            "isbn" => &mut reference.isbn,
            "reference_raw" => &mut reference.reference_raw,
            _ => unreachable!(),
        };
        *slot = text;
    }

    if reference.citation_key.is_empty() {
        return None;
    }
    if reference.citation_key.to_lowercase().contains("unknown") {
        return None;
    }
    if reference.title.is_empty() && reference.first_author.is_empty() {
        return None;
    }

    Some(reference)
}

/// Strings pass through; numbers are rendered (years arrive as either).
fn value_to_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}
