//! Common utilities and helper functions
//!
//! This module provides shared utilities used across the application.

pub mod error;
pub mod retry;

use lazy_static::lazy_static;
use regex::Regex;
use url::Url;

lazy_static! {
    static ref WHITESPACE_RE: Regex = Regex::new(r"\s+").expect("Invalid regex pattern");
}

/// Normalize whitespace in text
pub fn normalize_whitespace(text: &str) -> String {
    WHITESPACE_RE.replace_all(text.trim(), " ").to_string()
}

/// Convert a string to a URL-friendly slug (lowercase ASCII, hyphen separated)
///
/// Non-Latin scripts are transliterated, so any title with letters or
/// digits yields a non-empty slug.
///
/// # Examples
///
/// ```
/// use kb_exporter::utils::slugify;
///
/// assert_eq!(slugify("Getting Started"), "getting-started");
/// assert_eq!(slugify("  Café & Crème!  "), "cafe-creme");
/// assert_eq!(slugify("Начало работы"), "nachalo-raboty");
/// ```
pub fn slugify(text: &str) -> String {
    // apostrophes do not split words
    let joined: String = text
        .chars()
        .filter(|c| *c != '\'' && *c != '\u{2019}')
        .collect();
    slug::slugify(joined)
}

/// Scheme and host part of a URL (`https://help.example.com`)
pub fn origin(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    match parsed.port() {
        Some(port) => Some(format!("{}://{host}:{port}", parsed.scheme())),
        None => Some(format!("{}://{host}", parsed.scheme())),
    }
}

/// Whether the string is an absolute URL with a scheme
pub fn is_absolute_url(url: &str) -> bool {
    Url::parse(url).is_ok()
}
