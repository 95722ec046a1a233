//! Rule-driven rewriting of an owned tree into the output dialect
//!
//! A normalizer is a [`Rules`] implementation classifying each element into
//! one [`Action`]. The walk is pre-order: a rewritten element's children are
//! visited after the parent rule ran, with the rewritten tag on the
//! ancestor stack. Sibling-level fixups (list merging, wrapper collapsing,
//! empty paragraphs) run as separate passes over the finished tree.
//!
//! The result is checked by [`validate`], which rejects any tag, attribute
//! or class outside the dialect.

use super::dom::{self, Element, Node};
use crate::utils::error::ParseError;

/// What happens to an element
#[derive(Debug)]
pub enum Action {
    /// Keep the (possibly rewritten) element and normalize its children
    Keep(Element),
    /// Replace the element with these nodes, normalizing them in place
    Unwrap(Vec<Node>),
    /// Replace the element with these final nodes
    Replace(Vec<Node>),
    /// Delete the element and its subtree
    Drop,
}

/// Per-platform classification of nodes
pub trait Rules {
    /// Classify one element; `ancestors` holds the output tag names above it
    fn element(&self, el: Element, ancestors: &[String]) -> Result<Action, ParseError>;

    /// Rewrite a text node; `None` deletes it
    fn text(&self, text: String, _ancestors: &[String]) -> Result<Option<String>, ParseError> {
        Ok(Some(text))
    }
}

/// Apply `rules` to every node of `nodes`
///
/// # Errors
///
/// Propagates the first rule failure.
pub fn normalize<R: Rules + ?Sized>(rules: &R, nodes: Vec<Node>) -> Result<Vec<Node>, ParseError> {
    let mut ancestors = Vec::new();
    walk(rules, nodes, &mut ancestors)
}

fn walk<R: Rules + ?Sized>(
    rules: &R,
    nodes: Vec<Node>,
    ancestors: &mut Vec<String>,
) -> Result<Vec<Node>, ParseError> {
    let mut out = Vec::with_capacity(nodes.len());

    for node in nodes {
        match node {
            Node::Text(text) => {
                if let Some(text) = rules.text(text, ancestors)? {
                    out.push(Node::Text(text));
                }
            }
            Node::Element(el) => match rules.element(el, ancestors)? {
                Action::Keep(mut el) => {
                    let children = std::mem::take(&mut el.children);
                    ancestors.push(el.name.clone());
                    let children = walk(rules, children, ancestors);
                    ancestors.pop();
                    el.children = children?;
                    out.push(Node::Element(el));
                }
                Action::Unwrap(children) => out.extend(walk(rules, children, ancestors)?),
                Action::Replace(nodes) => out.extend(nodes),
                Action::Drop => {}
            },
        }
    }

    Ok(out)
}

/// Attributes that never carry content
fn is_presentational(name: &str) -> bool {
    matches!(
        name,
        "style" | "role" | "tabindex" | "dir" | "id" | "hidden" | "draggable" | "spellcheck"
            | "translate" | "contenteditable" | "title" | "width" | "height" | "align"
            | "valign" | "bgcolor" | "border" | "cellpadding" | "cellspacing" | "color"
            | "nowrap" | "lang" | "type"
    ) || name.starts_with("data-")
        || name.starts_with("aria-")
        || name.starts_with("on")
}

/// Remove styling, tracking and framework attributes, keeping `keep`
pub fn strip_presentational_attrs(el: &mut Element, keep: &[&str]) {
    el.attrs
        .retain(|name, _| keep.contains(&name.as_str()) || !is_presentational(name));
}

/// Remove presentational attributes except those the dialect allows on `el`
pub fn strip_to_dialect(el: &mut Element) {
    let tag = el.name.clone();
    el.attrs
        .retain(|name, _| allowed_attr(&tag, name) || !is_presentational(name));
}

/// Tags kept as they are by every normalizer
const PASSTHROUGH_TAGS: &[&str] = &[
    "p", "br", "hr", "strong", "em", "u", "s", "sub", "sup", "mark", "code", "pre",
    "blockquote", "ul", "ol", "li", "h1", "h2", "h3", "h4", "h5", "h6", "table", "thead",
    "tbody", "tfoot", "tr", "td", "th", "caption", "figure", "figcaption", "kbd",
];

#[must_use]
pub fn is_passthrough(name: &str) -> bool {
    PASSTHROUGH_TAGS.contains(&name)
}

/// Append the items of adjacent lists of the same kind to the first one
///
/// Whitespace and a single `<br>` between two lists do not separate them.
#[must_use]
pub fn merge_adjacent_lists(nodes: Vec<Node>) -> Vec<Node> {
    let mut out: Vec<Node> = Vec::with_capacity(nodes.len());
    // separators seen since the last list
    let mut pending: Vec<Node> = Vec::new();

    for node in nodes {
        let node = match node {
            Node::Element(mut el) => {
                el.children = merge_adjacent_lists(std::mem::take(&mut el.children));
                Node::Element(el)
            }
            text => text,
        };

        let is_separator = node.is_whitespace()
            || (node.is_element("br") && !pending.iter().any(|n| n.is_element("br")));
        let last_is_list = out
            .last()
            .and_then(Node::as_element)
            .is_some_and(|el| el.name == "ul" || el.name == "ol");

        if last_is_list && is_separator {
            pending.push(node);
            continue;
        }

        if let Node::Element(el) = &node {
            let mergeable = out
                .last()
                .and_then(Node::as_element)
                .is_some_and(|last| same_list(last, el));
            if mergeable {
                if let (Some(Node::Element(last)), Node::Element(el)) = (out.last_mut(), node) {
                    last.children.extend(el.children);
                }
                pending.clear();
                continue;
            }
        }

        out.append(&mut pending);
        out.push(node);
    }

    out.append(&mut pending);
    out
}

fn same_list(a: &Element, b: &Element) -> bool {
    (a.name == "ul" || a.name == "ol") && a.name == b.name && a.attrs == b.attrs
}

/// Replace attribute-less `div`s holding a single element by that element
#[must_use]
pub fn collapse_single_child_divs(nodes: Vec<Node>) -> Vec<Node> {
    nodes
        .into_iter()
        .map(|node| match node {
            Node::Element(mut el) => {
                el.children = collapse_single_child_divs(std::mem::take(&mut el.children));
                if el.name == "div" && el.attrs.is_empty() {
                    let significant: Vec<usize> = el
                        .children
                        .iter()
                        .enumerate()
                        .filter(|(_, c)| !c.is_whitespace())
                        .map(|(i, _)| i)
                        .collect();
                    if let [only] = significant[..] {
                        if matches!(el.children[only], Node::Element(_)) {
                            return el.children.swap_remove(only);
                        }
                    }
                }
                Node::Element(el)
            }
            text => text,
        })
        .collect()
}

/// Delete paragraphs without text or element content
#[must_use]
pub fn remove_empty_paragraphs(nodes: Vec<Node>) -> Vec<Node> {
    nodes
        .into_iter()
        .filter_map(|node| match node {
            Node::Element(mut el) => {
                el.children = remove_empty_paragraphs(std::mem::take(&mut el.children));
                let empty = el.name == "p"
                    && el.element_children().next().is_none()
                    && el.is_blank();
                (!empty).then_some(Node::Element(el))
            }
            text => Some(text),
        })
        .collect()
}

/// Trim leading and trailing whitespace-only text nodes
#[must_use]
pub fn trim_whitespace(mut nodes: Vec<Node>) -> Vec<Node> {
    while nodes.first().is_some_and(Node::is_whitespace) {
        nodes.remove(0);
    }
    while nodes.last().is_some_and(Node::is_whitespace) {
        nodes.pop();
    }
    nodes
}

const ALLOWED_TAGS: &[&str] = &[
    "p", "br", "hr", "a", "strong", "em", "u", "s", "sub", "sup", "mark", "code", "pre",
    "blockquote", "ul", "ol", "li", "h1", "h2", "h3", "h4", "h5", "h6", "table", "thead",
    "tbody", "tfoot", "tr", "td", "th", "caption", "figure", "figcaption", "img", "iframe",
    "div", "details", "summary", "kbd",
];

const CLASSES: &[&str] = &[
    "callout",
    "callout--info",
    "callout--warning",
    "callout--danger",
    "callout--success",
    "callout--icon",
    "iframe-wrapper",
    "video-embed",
    "align--center",
    "align--left",
    "align--right",
    "align--justify",
    "width--normal",
    "hljs",
    "action",
    "collapsible",
    "collapsible__header",
    "collapsible__content",
];

fn allowed_attr(tag: &str, attr: &str) -> bool {
    if attr == "class" {
        return true;
    }
    match tag {
        "a" => matches!(attr, "href" | "rel" | "target" | "title"),
        "img" => matches!(attr, "src" | "alt" | "title" | "width" | "height"),
        "iframe" => matches!(
            attr,
            "src" | "frameborder" | "allowfullscreen" | "allow" | "title" | "scrolling"
        ),
        "td" | "th" => matches!(attr, "colspan" | "rowspan"),
        "ol" => attr == "start",
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => attr == "id",
        _ => false,
    }
}

fn allowed_class(class: &str) -> bool {
    CLASSES.contains(&class) || class.starts_with("language-")
}

/// Drop the classes of `el` that the output dialect does not know
pub fn retain_dialect_classes(el: &mut Element) {
    let kept: Vec<String> = el
        .classes()
        .into_iter()
        .filter(|class| allowed_class(class))
        .map(str::to_string)
        .collect();
    el.set_classes(&kept);
}

/// Check that `nodes` only use the output dialect
///
/// # Errors
///
/// Returns `ParseError::UnknownNode` with the offending opening tag.
pub fn validate(nodes: &[Node], url: &str) -> Result<(), ParseError> {
    for el in nodes.iter().filter_map(Node::as_element) {
        let known = ALLOWED_TAGS.contains(&el.name.as_str())
            && el.attrs.keys().all(|attr| allowed_attr(&el.name, attr))
            && el.classes().iter().all(|class| allowed_class(class));
        if !known {
            return Err(ParseError::unknown(url, el.describe()));
        }
        validate(&el.children, url)?;
    }
    Ok(())
}

/// Validate and serialize normalized content
///
/// # Errors
///
/// Fails when the content uses markup outside the dialect.
pub fn render(nodes: &[Node], url: &str) -> Result<String, ParseError> {
    validate(nodes, url)?;
    Ok(dom::to_html(nodes).trim().to_string())
}
