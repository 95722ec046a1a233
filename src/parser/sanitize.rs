//! Text and date cleanup for extracted page fields
//!
//! Titles and descriptions come from arbitrary markup: invisible characters,
//! control characters and irregular whitespace are removed before they reach
//! the store. Dates are normalized to `%Y-%m-%dT%H:%M:%S` strings.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;

/// Timestamp format of the interchange document
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

lazy_static! {
    static ref WHITESPACE_REGEX: Regex = Regex::new(r"\s+").expect("valid whitespace regex");
}

/// Clean a single-line text field
///
/// 1. Remove zero-width characters
/// 2. Remove control characters
/// 3. Collapse whitespace runs (including non-breaking spaces) to one space
///
/// # Examples
///
/// ```
/// use kb_exporter::parser::sanitize::clean_text;
///
/// assert_eq!(clean_text("  Getting\u{200B}\n  started\u{a0} "), "Getting started");
/// ```
pub fn clean_text(text: &str) -> String {
    let result = remove_zero_width(text);
    let result = remove_control_chars(&result);
    WHITESPACE_REGEX
        .replace_all(result.trim(), " ")
        .trim()
        .to_string()
}

/// Clean an optional text field, mapping blank results to `None`
pub fn clean_optional(text: Option<&str>) -> Option<String> {
    text.map(clean_text).filter(|t| !t.is_empty())
}

/// Remove zero-width spaces, direction marks and the byte order mark
pub fn remove_zero_width(text: &str) -> String {
    text.chars()
        .filter(|c| !matches!(*c, '\u{200B}'..='\u{200F}' | '\u{202A}'..='\u{202E}' | '\u{FEFF}'))
        .collect()
}

/// Remove control characters except newline and tab
pub fn remove_control_chars(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect()
}

/// Parse a date with one of `formats`, returning the normalized timestamp
///
/// Formats with a time part are tried as date-times, the others as dates at
/// midnight.
pub fn parse_date(text: &str, formats: &[&str]) -> Option<String> {
    let text = clean_text(text);

    for format in formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(&text, format) {
            return Some(dt.format(TIMESTAMP_FORMAT).to_string());
        }
        if let Ok(date) = NaiveDate::parse_from_str(&text, format) {
            let dt = date.and_hms_opt(0, 0, 0)?;
            return Some(dt.format(TIMESTAMP_FORMAT).to_string());
        }
    }

    tracing::debug!(date = %text, "Unrecognized date");
    None
}

/// Normalize an RFC 3339 timestamp (`2024-05-01T10:00:00.000Z`)
pub fn parse_rfc3339(text: &str) -> Option<String> {
    DateTime::parse_from_rfc3339(text.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc).format(TIMESTAMP_FORMAT).to_string())
}

/// Normalize a millisecond Unix timestamp
pub fn from_millis(millis: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|dt| dt.format(TIMESTAMP_FORMAT).to_string())
}
