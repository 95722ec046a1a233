//! Selector helpers shared by the site adapters
//!
//! Every lookup that a crawl depends on goes through [`select_one`] so a
//! missing element is reported with the page URL and the selector that
//! failed to match.

use scraper::{ElementRef, Html, Selector};

use crate::utils::error::ParseError;

/// Parse a selector literal, panicking on an invalid literal at first use
#[macro_export]
macro_rules! parse_selector {
    ($s:expr) => {
        ::scraper::Selector::parse($s).expect(concat!("Invalid CSS selector: ", $s))
    };
}

/// Anything that can be searched with a selector
pub trait Select<'a> {
    fn select_all(self, selector: &Selector) -> Vec<ElementRef<'a>>;
}

impl<'a> Select<'a> for &'a Html {
    fn select_all(self, selector: &Selector) -> Vec<ElementRef<'a>> {
        self.select(selector).collect()
    }
}

impl<'a> Select<'a> for ElementRef<'a> {
    fn select_all(self, selector: &Selector) -> Vec<ElementRef<'a>> {
        self.select(selector).collect()
    }
}

/// First element matching `selector`
///
/// # Errors
///
/// Returns `ParseError::MissingElement` naming `label` (the selector text)
/// and `url` when nothing matches.
pub fn select_one<'a, S: Select<'a>>(
    scope: S,
    selector: &Selector,
    label: &str,
    url: &str,
) -> Result<ElementRef<'a>, ParseError> {
    scope
        .select_all(selector)
        .into_iter()
        .next()
        .ok_or_else(|| ParseError::missing(url, label))
}

/// First element matching `selector`, if any
pub fn select_first<'a, S: Select<'a>>(scope: S, selector: &Selector) -> Option<ElementRef<'a>> {
    scope.select_all(selector).into_iter().next()
}

/// Whitespace-normalized text of an element
#[must_use]
pub fn text_of(el: ElementRef<'_>) -> String {
    crate::parser::sanitize::clean_text(&el.text().collect::<String>())
}

/// Required attribute value
///
/// # Errors
///
/// Returns `ParseError::MissingAttribute` when the attribute is absent.
pub fn attr<'a>(el: ElementRef<'a>, name: &str, url: &str) -> Result<&'a str, ParseError> {
    el.value()
        .attr(name)
        .ok_or_else(|| ParseError::MissingAttribute {
            url: url.to_string(),
            element: el.value().name().to_string(),
            attribute: name.to_string(),
        })
}

/// Direct element children of `el`
pub fn element_children<'a>(el: ElementRef<'a>) -> Vec<ElementRef<'a>> {
    el.children().filter_map(ElementRef::wrap).collect()
}
