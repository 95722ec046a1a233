//! HTML parsing and content normalization
//!
//! Site adapters select their content with `scraper`, copy it into the owned
//! tree of [`dom`], rewrite it with a [`normalize::Rules`] implementation and
//! render it through the dialect check.

pub mod dom;
pub mod json;
pub mod media;
pub mod normalize;
pub mod sanitize;
pub mod selectors;

pub use dom::{parse_fragment, Element, Node};
pub use media::Callout;
pub use normalize::{normalize, render, Action, Rules};

use scraper::Html;

/// A fetched HTML page together with its final URL
pub struct Document {
    pub url: String,
    pub html: Html,
}

impl Document {
    /// Parse a full HTML document
    #[must_use]
    pub fn parse(url: impl Into<String>, body: &str) -> Self {
        Self {
            url: url.into(),
            html: Html::parse_document(body),
        }
    }
}
