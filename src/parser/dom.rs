//! Owned HTML tree used by the normalizers
//!
//! `scraper` documents are immutable, so the content subtree of a page is
//! copied into this small owned representation, rewritten by value, then
//! serialized back to markup.

use indexmap::IndexMap;
use scraper::{ElementRef, Html, Node as RawNode};
use std::fmt::Write as _;

/// Elements serialized without a closing tag
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

/// A node of the owned tree; comments and doctypes are not kept
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

impl Node {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    #[must_use]
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Self::Element(el) => Some(el),
            Self::Text(_) => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut Element> {
        match self {
            Self::Element(el) => Some(el),
            Self::Text(_) => None,
        }
    }

    /// Whether this is a text node made of whitespace only
    #[must_use]
    pub fn is_whitespace(&self) -> bool {
        matches!(self, Self::Text(t) if t.trim().is_empty())
    }

    #[must_use]
    pub fn is_element(&self, name: &str) -> bool {
        matches!(self, Self::Element(el) if el.name == name)
    }

    fn collect_text(&self, out: &mut String) {
        match self {
            Self::Text(t) => out.push_str(t),
            Self::Element(el) => el.children.iter().for_each(|c| c.collect_text(out)),
        }
    }

    fn write_html(&self, out: &mut String) {
        match self {
            Self::Text(t) => out.push_str(&html_escape::encode_text(t)),
            Self::Element(el) => el.write_html(out),
        }
    }
}

impl From<Element> for Node {
    fn from(el: Element) -> Self {
        Self::Element(el)
    }
}

/// An element with ordered attributes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attrs: IndexMap<String, String>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: IndexMap::new(),
            children: Vec::new(),
        }
    }

    /// Copy a parsed element and its subtree
    #[must_use]
    pub fn from_ref(el: ElementRef<'_>) -> Self {
        let value = el.value();
        let attrs = value
            .attrs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        let children = el
            .children()
            .filter_map(|child| match child.value() {
                RawNode::Text(text) => Some(Node::Text(text.text.to_string())),
                RawNode::Element(_) => {
                    ElementRef::wrap(child).map(|e| Node::Element(Self::from_ref(e)))
                }
                _ => None,
            })
            .collect();

        Self {
            name: value.name().to_string(),
            attrs,
            children,
        }
    }

    #[must_use]
    pub fn with_attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    #[must_use]
    pub fn with_class(self, class: &str) -> Self {
        self.with_attr("class", class)
    }

    #[must_use]
    pub fn with_children(mut self, children: Vec<Node>) -> Self {
        self.children = children;
        self
    }

    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children = vec![Node::Text(text.into())];
        self
    }

    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.contains_key(name)
    }

    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        self.attrs.insert(name.to_string(), value.into());
    }

    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        self.attrs.shift_remove(name)
    }

    pub fn remove_attrs(&mut self, names: &[&str]) {
        for name in names {
            self.attrs.shift_remove(*name);
        }
    }

    #[must_use]
    pub fn classes(&self) -> Vec<&str> {
        self.attr("class")
            .map(|c| c.split_whitespace().collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn has_class(&self, class: &str) -> bool {
        self.classes().contains(&class)
    }

    /// Remove a class, dropping the attribute once empty; true if it was present
    pub fn remove_class(&mut self, class: &str) -> bool {
        let classes = self.classes();
        if !classes.contains(&class) {
            return false;
        }
        let rest: Vec<String> = classes
            .into_iter()
            .filter(|c| *c != class)
            .map(str::to_string)
            .collect();
        self.set_classes(&rest);
        true
    }

    /// Remove every class of `known`, returning the classes left over
    pub fn remove_classes(&mut self, known: &[&str]) -> Vec<String> {
        let rest: Vec<String> = self
            .classes()
            .into_iter()
            .filter(|c| !known.contains(c))
            .map(str::to_string)
            .collect();
        self.set_classes(&rest);
        rest
    }

    pub fn set_classes<S: AsRef<str>>(&mut self, classes: &[S]) {
        if classes.is_empty() {
            self.remove_attr("class");
        } else {
            let joined = classes.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(" ");
            self.set_attr("class", joined);
        }
    }

    /// Concatenated text of the subtree
    #[must_use]
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.children.iter().for_each(|c| c.collect_text(&mut out));
        out
    }

    /// Whether the subtree has no visible text
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.text().trim().is_empty()
    }

    pub fn element_children(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    /// Children that are not whitespace-only text
    #[must_use]
    pub fn significant_children(&self) -> Vec<&Node> {
        self.children.iter().filter(|c| !c.is_whitespace()).collect()
    }

    /// First descendant (pre-order) matching `pred`
    pub fn find<P: Fn(&Element) -> bool + Copy>(&self, pred: P) -> Option<&Element> {
        for child in self.element_children() {
            if pred(child) {
                return Some(child);
            }
            if let Some(found) = child.find(pred) {
                return Some(found);
            }
        }
        None
    }

    /// Remove the first descendant (pre-order) matching `pred`
    pub fn remove_first<P: Fn(&Element) -> bool + Copy>(&mut self, pred: P) -> Option<Element> {
        for i in 0..self.children.len() {
            let Node::Element(child) = &mut self.children[i] else {
                continue;
            };
            if pred(child) {
                if let Node::Element(found) = self.children.remove(i) {
                    return Some(found);
                }
                return None;
            }
            if let Some(found) = child.remove_first(pred) {
                return Some(found);
            }
        }
        None
    }

    #[must_use]
    pub fn find_class(&self, class: &str) -> Option<&Element> {
        self.find(|el| el.has_class(class))
    }

    #[must_use]
    pub fn find_tag(&self, name: &str) -> Option<&Element> {
        self.find(|el| el.name == name)
    }

    /// Opening tag, used to identify a node in diagnostics
    #[must_use]
    pub fn describe(&self) -> String {
        let mut out = format!("<{}", self.name);
        for (k, v) in &self.attrs {
            let _ = write!(out, " {k}=\"{v}\"");
        }
        out.push('>');
        out
    }

    #[must_use]
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    fn write_html(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (k, v) in &self.attrs {
            out.push(' ');
            out.push_str(k);
            out.push_str("=\"");
            out.push_str(&html_escape::encode_double_quoted_attribute(v));
            out.push('"');
        }
        out.push('>');

        if VOID_ELEMENTS.contains(&self.name.as_str()) {
            return;
        }
        for child in &self.children {
            child.write_html(out);
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

/// Serialize a node list
#[must_use]
pub fn to_html(nodes: &[Node]) -> String {
    let mut out = String::new();
    for node in nodes {
        node.write_html(&mut out);
    }
    out
}

/// Parse an HTML fragment into owned nodes
#[must_use]
pub fn parse_fragment(html: &str) -> Vec<Node> {
    let fragment = Html::parse_fragment(html);
    Element::from_ref(fragment.root_element()).children
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_serialize_fragment() {
        let nodes = parse_fragment(r#"<p class="a b">Hello <b>world</b> &amp; co<br></p>"#);
        assert_eq!(
            to_html(&nodes),
            r#"<p class="a b">Hello <b>world</b> &amp; co<br></p>"#
        );
    }

    #[test]
    fn test_comments_are_dropped() {
        let nodes = parse_fragment("<p>a<!-- hidden -->b</p>");
        assert_eq!(to_html(&nodes), "<p>ab</p>");
    }

    #[test]
    fn test_class_helpers() {
        let mut el = Element::new("div").with_class("notion-text notion-blue");
        assert!(el.has_class("notion-blue"));
        assert!(el.remove_class("notion-blue"));
        assert!(!el.remove_class("notion-blue"));
        assert_eq!(el.attr("class"), Some("notion-text"));

        let rest = el.remove_classes(&["notion-text"]);
        assert!(rest.is_empty());
        assert!(!el.has_attr("class"));
    }

    #[test]
    fn test_attribute_values_are_escaped() {
        let el = Element::new("a")
            .with_attr("href", "https://x.io/?a=1&b=\"2\"")
            .with_text("<x>");
        assert_eq!(
            el.to_html(),
            r#"<a href="https://x.io/?a=1&amp;b=&quot;2&quot;">&lt;x&gt;</a>"#
        );
    }

    #[test]
    fn test_text_and_find() {
        let nodes = parse_fragment("<div><span>a</span><p class=\"x\">b <i>c</i></p></div>");
        let div = nodes[0].as_element().unwrap();
        assert_eq!(div.text(), "ab c");
        assert_eq!(div.find_class("x").unwrap().name, "p");
        assert_eq!(div.find_tag("i").unwrap().text(), "c");
        assert!(div.find_tag("table").is_none());
    }

    #[test]
    fn test_remove_first() {
        let nodes = parse_fragment("<div><h1>Title</h1><p><h1>Other</h1></p></div>");
        let mut div = nodes[0].as_element().unwrap().clone();
        let removed = div.remove_first(|el| el.name == "h1").unwrap();
        assert_eq!(removed.text(), "Title");
        assert_eq!(div.find_tag("h1").unwrap().text(), "Other");
    }

    #[test]
    fn test_describe() {
        let el = Element::new("marquee").with_attr("class", "x");
        assert_eq!(el.describe(), "<marquee class=\"x\">");
    }
}
