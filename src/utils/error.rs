//! Error types for the knowledge base exporter
//!
//! This module defines the domain error types used throughout the application.

use thiserror::Error;

/// Errors that can occur while fetching pages from a source site
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status code
    #[error("Unexpected status {status} for {url}")]
    Status { url: String, status: u16 },

    /// Navigation or request timeout
    #[error("Request timeout for {0}")]
    Timeout(String),

    /// Maximum retry attempts exceeded
    #[error("Maximum retry attempts ({attempts}) exceeded for {url}")]
    MaxRetriesExceeded { url: String, attempts: u32 },

    /// Content decoding error
    #[error("Decoding error: {0}")]
    Decode(String),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Scripted browser failure
    #[error("Browser error: {0}")]
    Browser(String),

    /// Page cache failure
    #[error("Cache error: {0}")]
    Cache(String),
}

impl FetchError {
    /// Whether the failure is a timeout worth retrying
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout(_) => true,
            Self::Http(e) => e.is_timeout(),
            _ => false,
        }
    }
}

/// Errors raised when a source site does not have the expected shape,
/// or when normalization meets markup it does not recognize
#[derive(Error, Debug)]
pub enum ParseError {
    /// A required element was not found in a page
    #[error("Element `{selector}` not found in {url}")]
    MissingElement { url: String, selector: String },

    /// A required attribute was missing on an element
    #[error("Attribute `{attribute}` missing on {element} in {url}")]
    MissingAttribute {
        url: String,
        element: String,
        attribute: String,
    },

    /// The page or payload has an unexpected structure
    #[error("Unexpected shape in {url}: {detail}")]
    UnexpectedShape { url: String, detail: String },

    /// Normalization met a node it has no rule for
    #[error("Unknown node in {url}: {node}")]
    UnknownNode { url: String, node: String },

    /// A JSON content block of an unknown or malformed kind
    #[error("Invalid block in {url}: {detail}")]
    InvalidBlock { url: String, detail: String },

    /// JSON payload could not be decoded
    #[error("Invalid JSON in {url}: {source}")]
    InvalidJson {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ParseError {
    pub fn missing(url: impl Into<String>, selector: impl Into<String>) -> Self {
        Self::MissingElement {
            url: url.into(),
            selector: selector.into(),
        }
    }

    pub fn shape(url: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::UnexpectedShape {
            url: url.into(),
            detail: detail.into(),
        }
    }

    pub fn unknown(url: impl Into<String>, node: impl Into<String>) -> Self {
        Self::UnknownNode {
            url: url.into(),
            node: node.into(),
        }
    }
}

/// Precondition violations raised by the knowledge store
#[derive(Error, Debug, PartialEq, Eq)]
pub enum StoreError {
    /// Category or article without a title
    #[error("Title is required")]
    EmptyTitle,

    /// Article without content
    #[error("Content is required for article `{0}`")]
    EmptyContent(String),

    /// Article without a source URL
    #[error("previous_url is required for article `{0}`")]
    MissingPreviousUrl(String),

    /// Article source URL is not absolute
    #[error("Invalid previous_url `{0}`: must be an absolute URL")]
    RelativePreviousUrl(String),

    /// Referenced category does not exist
    #[error("Unknown category `{0}`")]
    UnknownCategory(String),

    /// Referenced article does not exist
    #[error("Unknown article `{0}`")]
    UnknownArticle(String),

    /// Text slugified to nothing
    #[error("Cannot build a slug from `{0}`")]
    EmptySlug(String),

    /// Language registered twice
    #[error("Language `{0}` already in the export")]
    DuplicateLanguage(String),

    /// Operation needs an active language
    #[error("No language has been registered yet")]
    NoActiveLanguage,
}
