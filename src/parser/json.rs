//! Typed lookups into JSON payloads embedded in pages
//!
//! Paths are JSON pointers (`/props/pageProps/theme/logo`). A missing
//! required value is an unexpected source shape, reported with the path
//! and the page URL.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::utils::error::ParseError;

fn missing(url: &str, path: &str, expected: &str) -> ParseError {
    ParseError::shape(url, format!("expected {expected} at `{path}`"))
}

/// Required value
///
/// # Errors
///
/// Returns `ParseError::UnexpectedShape` when the path does not exist.
pub fn at<'a>(value: &'a Value, path: &str, url: &str) -> Result<&'a Value, ParseError> {
    value
        .pointer(path)
        .filter(|v| !v.is_null())
        .ok_or_else(|| missing(url, path, "a value"))
}

/// Required string
///
/// # Errors
///
/// Returns `ParseError::UnexpectedShape` when absent or not a string.
pub fn str_at(value: &Value, path: &str, url: &str) -> Result<String, ParseError> {
    value
        .pointer(path)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| missing(url, path, "a string"))
}

/// Optional non-empty string
#[must_use]
pub fn opt_str(value: &Value, path: &str) -> Option<String> {
    value
        .pointer(path)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Required integer
///
/// # Errors
///
/// Returns `ParseError::UnexpectedShape` when absent or not an integer.
pub fn i64_at(value: &Value, path: &str, url: &str) -> Result<i64, ParseError> {
    value
        .pointer(path)
        .and_then(Value::as_i64)
        .ok_or_else(|| missing(url, path, "an integer"))
}

/// Required array
///
/// # Errors
///
/// Returns `ParseError::UnexpectedShape` when absent or not an array.
pub fn array_at<'a>(value: &'a Value, path: &str, url: &str) -> Result<&'a [Value], ParseError> {
    value
        .pointer(path)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .ok_or_else(|| missing(url, path, "an array"))
}

/// Array at `path`, empty when absent
#[must_use]
pub fn opt_array<'a>(value: &'a Value, path: &str) -> &'a [Value] {
    value
        .pointer(path)
        .and_then(Value::as_array)
        .map_or(&[][..], Vec::as_slice)
}

/// Deserialize the value at `path`
///
/// # Errors
///
/// Fails when the path is missing or the value has another shape.
pub fn decode_at<T: DeserializeOwned>(value: &Value, path: &str, url: &str) -> Result<T, ParseError> {
    let raw = at(value, path, url)?;
    T::deserialize(raw).map_err(|source| ParseError::InvalidJson {
        url: url.to_string(),
        source,
    })
}

/// Parse a JSON document
///
/// # Errors
///
/// Returns `ParseError::InvalidJson` for malformed text.
pub fn parse(text: &str, url: &str) -> Result<Value, ParseError> {
    serde_json::from_str(text).map_err(|source| ParseError::InvalidJson {
        url: url.to_string(),
        source,
    })
}
