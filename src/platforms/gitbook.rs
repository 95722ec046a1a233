//! GitBook sites
//!
//! Pages are rendered client side, so this adapter asks for a browser
//! fetcher. The sidebar menu gives the category tree: nested lists become
//! nested categories, internal links become articles and external links end
//! up in the footer.

use async_trait::async_trait;
use lazy_static::lazy_static;
use scraper::{ElementRef, Selector};
use std::collections::HashMap;
use tracing::{info, warn};

use super::{Platform, Session, Transport};
use crate::crawler::url::strip_language_segment;
use crate::error::Result;
use crate::models::{CategoryId, LinkPosition, Metadata, NewArticle, NewCategory};
use crate::parse_selector;
use crate::parser::dom::{Element, Node};
use crate::parser::media::{self, Callout};
use crate::parser::normalize::{self, is_passthrough, strip_to_dialect, Action, Rules};
use crate::parser::sanitize::parse_rfc3339;
use crate::parser::selectors::{attr, select_first, select_one, text_of};
use crate::parser::Document;
use crate::utils::error::ParseError;

lazy_static! {
    static ref HEADER: Selector = parse_selector!("body>header div.scroll-nojump>div");
    static ref ANCHOR: Selector = parse_selector!("a");
    static ref LOGO: Selector = parse_selector!("img");
    static ref SITE_TITLE: Selector = parse_selector!("div");
    static ref PAGE_TITLE: Selector = parse_selector!("title");
    static ref SIDEBAR: Selector = parse_selector!("body>div aside>div>div>ul");
    static ref MAIN: Selector = parse_selector!("div>main");
    static ref ARTICLE_TITLE: Selector = parse_selector!("h1");
    static ref ARTICLE_DESCRIPTION: Selector = parse_selector!("p");
    static ref UPDATED: Selector = parse_selector!("p>time");
}

pub struct Gitbook;

#[async_trait(?Send)]
impl Platform for Gitbook {
    fn name(&self) -> &'static str {
        "gitbook"
    }

    fn transport(&self) -> Transport {
        Transport::Browser
    }

    async fn load(
        &self,
        session: &mut Session<'_>,
        base_url: &str,
        language: Option<&str>,
    ) -> Result<()> {
        let base_url = strip_language_segment(base_url);
        session.add_language(language.unwrap_or("en"), &base_url)?;

        let home = session.get_html(&base_url).await?;
        let (metadata, header_links) = site_metadata(&home)?;
        session.set_metadata(metadata)?;
        for (title, href) in header_links {
            let url = session.resolve(&href)?;
            session.add_link(&title, &url, LinkPosition::Header)?;
        }

        let sidebar = select_one(&home.html, &SIDEBAR, "aside sidebar menu", &home.url)?;
        let articles = walk_menu(session, sidebar, &home.url)?;
        info!(count = articles.len(), "Found articles");

        let mut seen = HashMap::new();
        for (href, category) in articles {
            if let Some(id) = seen.get(&href) {
                if let Some(category) = &category {
                    session.add_article_to_category(id, category)?;
                }
                continue;
            }

            let page = session.get_html(&href).await?;
            let Some(article) = parse_article(&page, &base_url)? else {
                warn!(url = %page.url, "Page without content, skipped");
                continue;
            };
            let id = session.save_article(category.as_ref(), article)?;
            seen.insert(href, id);
        }

        Ok(())
    }
}

/// Candidate of a `srcset` with the largest width descriptor
fn largest_candidate(srcset: &str) -> Option<String> {
    srcset
        .split(',')
        .filter_map(|candidate| {
            let mut parts = candidate.split_whitespace();
            let src = parts.next()?;
            let width = parts.next()?.strip_suffix('w')?.parse::<u32>().ok()?;
            Some((width, src))
        })
        .max_by_key(|(width, _)| *width)
        .map(|(_, src)| src.to_string())
}

fn element_children(el: ElementRef<'_>) -> impl Iterator<Item = ElementRef<'_>> {
    el.children().filter_map(ElementRef::wrap)
}

/// Logo and title from the page header, plus the header navigation links
fn site_metadata(home: &Document) -> Result<(Metadata, Vec<(String, String)>)> {
    let header = select_one(&home.html, &HEADER, "body>header div.scroll-nojump>div", &home.url)?;
    let mut blocks = element_children(header);

    let brand = blocks
        .next()
        .ok_or_else(|| ParseError::missing(&home.url, "header brand"))?;
    let brand = select_one(brand, &ANCHOR, "header brand a", &home.url)?;

    let logo = select_first(brand, &LOGO).and_then(|img| match img.value().attr("srcset") {
        Some(srcset) => largest_candidate(srcset),
        None => img.value().attr("src").map(str::to_string),
    });
    let title = select_first(brand, &SITE_TITLE)
        .map(text_of)
        .filter(|t| !t.is_empty())
        .or_else(|| select_first(&home.html, &PAGE_TITLE).map(text_of));

    let mut links = Vec::new();
    if let Some(nav) = blocks.next().and_then(|menu| element_children(menu).nth(1)) {
        for a in nav.select(&ANCHOR) {
            links.push((text_of(a), attr(a, "href", &home.url)?.to_string()));
        }
    }

    Ok((
        Metadata {
            title,
            logo,
            ..Default::default()
        },
        links,
    ))
}

/// List of a sidebar submenu: the `ul` itself or a `div` holding only it
fn submenu_list(el: ElementRef<'_>) -> Option<ElementRef<'_>> {
    match el.value().name() {
        "ul" => Some(el),
        "div" => {
            let children: Vec<_> = element_children(el).collect();
            match children[..] {
                [list] if list.value().name() == "ul" => Some(list),
                _ => None,
            }
        }
        _ => None,
    }
}

fn menu_items(list: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    element_children(list)
        .filter(|item| item.value().name() == "li")
        .collect()
}

/// Save the sidebar categories in menu order and list the internal article
/// links with their category
///
/// An item is either a link or a title (`a` or `div`) followed by a
/// submenu.
fn walk_menu(
    session: &mut Session<'_>,
    menu: ElementRef<'_>,
    url: &str,
) -> Result<Vec<(String, Option<CategoryId>)>> {
    let mut articles = Vec::new();
    let mut pending: Vec<(Option<CategoryId>, ElementRef<'_>)> =
        menu_items(menu).into_iter().rev().map(|item| (None, item)).collect();

    while let Some((category, item)) = pending.pop() {
        let parts: Vec<_> = element_children(item).collect();
        match parts[..] {
            [link] if link.value().name() == "a" => {
                let href = attr(link, "href", url)?;
                if href.starts_with('/') {
                    articles.push((href.to_string(), category));
                } else {
                    session.add_link(&text_of(link), href, LinkPosition::Footer)?;
                }
            }
            [title, submenu] => {
                let list = submenu_list(submenu).ok_or_else(|| {
                    ParseError::shape(url, format!("sidebar submenu <{}>", submenu.value().name()))
                })?;
                let child = session.save_category(category.as_ref(), NewCategory::titled(text_of(title)))?;
                pending.extend(
                    menu_items(list)
                        .into_iter()
                        .rev()
                        .map(|item| (Some(child.clone()), item)),
                );
            }
            _ => {
                return Err(ParseError::shape(url, format!("sidebar item with {} children", parts.len())).into())
            }
        }
    }

    Ok(articles)
}

/// Article of a page; `None` when the page has no content block
fn parse_article(doc: &Document, base_url: &str) -> Result<Option<NewArticle>> {
    let main = select_one(&doc.html, &MAIN, "div>main", &doc.url)?;
    let blocks: Vec<_> = element_children(main).collect();
    let (header, body, footer) = match blocks[..] {
        [_, _, _] => return Ok(None),
        [header, body, _, footer] => (header, body, footer),
        _ => return Err(ParseError::shape(&doc.url, format!("{} blocks in main", blocks.len())).into()),
    };

    let title = text_of(select_one(header, &ARTICLE_TITLE, "h1", &doc.url)?);
    let description = select_first(header, &ARTICLE_DESCRIPTION)
        .map(text_of)
        .filter(|d| !d.is_empty());
    let time = select_one(footer, &UPDATED, "p>time", &doc.url)?;
    let last_updated = parse_rfc3339(attr(time, "datetime", &doc.url)?);

    let rules = ContentRules {
        base_url,
        url: &doc.url,
    };
    let nodes = normalize::normalize(&rules, Element::from_ref(body).children)?;
    let nodes = normalize::collapse_single_child_divs(nodes);
    let content = normalize::render(&normalize::trim_whitespace(nodes), &doc.url)?;

    Ok(Some(NewArticle {
        title,
        description,
        content,
        last_updated,
        previous_url: doc.url.clone(),
        ..Default::default()
    }))
}

struct ContentRules<'a> {
    base_url: &'a str,
    url: &'a str,
}

impl ContentRules<'_> {
    fn unknown(&self, el: &Element) -> ParseError {
        ParseError::unknown(self.url, el.describe())
    }

    /// Hint block: an optional colored icon followed by the body
    fn hint(&self, el: &Element) -> std::result::Result<Action, ParseError> {
        let orange = el.classes().iter().any(|c| c.contains("bg-orange"));
        let parts: Vec<&Element> = el.element_children().collect();

        let (kind, icon, body) = match parts[..] {
            [marker, body] => {
                let classes = marker.attr("class").unwrap_or_default();
                let kind = if classes.contains("text-info") {
                    Callout::Info
                } else if classes.contains("text-warning") {
                    Callout::Warning
                } else if classes.contains("text-danger") {
                    Callout::Danger
                } else if classes.contains("text-success") {
                    Callout::Success
                } else {
                    return Err(self.unknown(marker));
                };
                (kind, true, body)
            }
            [body] => {
                let kind = if orange { Callout::Warning } else { Callout::Info };
                let icon = body.element_children().next().is_some_and(|c| c.name == "svg");
                (kind, icon, body)
            }
            _ => return Err(self.unknown(el)),
        };

        Ok(Action::Keep(kind.wrap(body.children.clone(), icon)))
    }

    fn picture(&self, mut el: Element) -> Action {
        if el.find_tag("img").is_none() {
            for child in el.children.iter_mut().filter_map(Node::as_element_mut) {
                if child.name == "figcaption" {
                    child.name = "div".into();
                }
            }
            return Action::Unwrap(el.children);
        }

        el.name = "figure".into();
        el.set_classes(&["align--center", "width--normal"]);
        if let Some(i) = el.children.iter().position(|c| !c.is_whitespace()) {
            if el.children[i].is_element("div") {
                if let Node::Element(wrapper) = el.children.remove(i) {
                    el.children.splice(i..i, wrapper.children);
                }
            }
        }
        Action::Keep(el)
    }
}

impl Rules for ContentRules<'_> {
    fn element(&self, mut el: Element, ancestors: &[String]) -> std::result::Result<Action, ParseError> {
        match el.name.as_str() {
            "template" | "svg" | "select" | "button" => return Ok(Action::Drop),
            "div" if el.has_class("scalar-app") => return Ok(Action::Drop),
            "div" if el.has_class("hint") => return self.hint(&el),
            _ => {}
        }

        if let Some(role) = el.attr("role").map(str::to_string) {
            match role.as_str() {
                "table" => el.name = "table".into(),
                "row" => el.name = "tr".into(),
                "columnheader" => el.name = "th".into(),
                "cell" => el.name = "td".into(),
                "rowgroup" | "tabpanel" => return Ok(Action::Unwrap(el.children)),
                "dialog" | "tablist" | "tab" => return Ok(Action::Drop),
                other => warn!(url = %self.url, role = other, "Unknown role"),
            }
        }

        strip_to_dialect(&mut el);

        match el.name.as_str() {
            "i" | "b" => {
                el.name = if el.name == "i" { "em" } else { "strong" }.into();
                el.remove_attr("class");
                Ok(Action::Keep(el))
            }
            "span" => Ok(Action::Unwrap(el.children)),
            "h1" => Err(self.unknown(&el)),
            name if media::is_heading(name) => {
                el.remove_attr("class");
                // anchor icon, then the heading text
                let anchored = matches!(
                    &el.children[..],
                    [Node::Element(icon), Node::Element(_)] if icon.find_tag("a").is_some()
                );
                if anchored {
                    if let Some(Node::Element(text)) = el.children.pop() {
                        el.children = text.children;
                    }
                }
                Ok(Action::Keep(el))
            }
            "a" => {
                el.remove_attr("class");
                Ok(Action::Keep(media::clean_link(el, self.base_url, self.url, true)?))
            }
            "picture" => Ok(self.picture(el)),
            "img" => Ok(Action::Replace(vec![media::figure_image(
                el,
                ancestors.last().map(String::as_str),
            )])),
            "iframe" => Ok(Action::Replace(vec![media::video_embed(el).into()])),
            "div" => {
                el.remove_attr("class");
                Ok(Action::Keep(el))
            }
            name if is_passthrough(name) => {
                el.remove_attr("class");
                Ok(Action::Keep(el))
            }
            _ => Err(self.unknown(&el)),
        }
    }
}
