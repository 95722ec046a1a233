//! HelpKit sites (Notion pages rendered by HelpKit)
//!
//! Category cards on the home page lead to pages grouping article cards by
//! sub-collection. Article URLs end with a base58 short id of the Notion
//! page uuid; internal Notion links (`/<uuid>`) are rewritten to the
//! article URLs found while listing, and links to unknown pages become `#`.

use async_trait::async_trait;
use lazy_static::lazy_static;
use scraper::Selector;
use std::collections::HashMap;
use tracing::{info, warn};
use uuid::Uuid;

use super::notion::callout_for_color;
use super::{Platform, Session};
use crate::error::Result;
use crate::models::{CategoryId, NewArticle, NewCategory};
use crate::parse_selector;
use crate::parser::dom::{Element, Node};
use crate::parser::media;
use crate::parser::normalize::{self, strip_to_dialect, Action, Rules};
use crate::parser::sanitize::{clean_text, parse_date};
use crate::parser::selectors::{attr, select_first, select_one, text_of};
use crate::parser::Document;
use crate::utils::error::ParseError;
use crate::utils::slugify;

lazy_static! {
    static ref CATEGORY_CARDS: Selector = parse_selector!("#__layout .helpkit-category-card");
    static ref CATEGORY_ICON: Selector = parse_selector!(".helpkit-category-icon-emoji");
    static ref CATEGORY_TITLE: Selector = parse_selector!("h2");
    static ref CATEGORY_DESCRIPTION: Selector = parse_selector!(".leading-snug");
    static ref SUBCOLLECTIONS: Selector = parse_selector!("#__layout .helpkit-subcollection-wrapper");
    static ref SUBCOLLECTION_TITLE: Selector = parse_selector!("h2");
    static ref ARTICLE_CARDS: Selector = parse_selector!(".helpkit-article-card");
    static ref ARTICLE_TITLE: Selector = parse_selector!("h3");
    static ref ARTICLE_DESCRIPTION: Selector = parse_selector!("p");
    static ref UPDATED: Selector = parse_selector!(".helpkit-article-meta-wrapper p");
}

/// Alphabet of the short ids (`short-uuid` flavor of base58)
const BASE58: &[u8] = b"123456789abcdefghijkmnopqrstuvwxyzABCDEFGHJKLMNPQRSTUVWXYZ";

/// Inline tags collapsed when directly nested in themselves
const SELF_NESTING: &[&str] = &["b", "em", "strong", "u", "s", "span", "pre"];

/// Layout wrappers without meaning
const LAYOUT_DIVS: &[&str] = &[
    "notion-spacer",
    "notion-sync-block",
    "notion-row",
    "notion-column",
    "notion-simple-table-header",
    "notion-simple-table-footer",
    "notion-simple-table-wrapper",
    "notion-simple-table-cell-text",
];

/// Page uuid of a short id
#[must_use]
pub fn long_uuid(short: &str) -> Option<Uuid> {
    let mut num: u128 = 0;
    for c in short.bytes() {
        let digit = BASE58.iter().position(|&a| a == c)?;
        num = num.checked_mul(58)?.checked_add(digit as u128)?;
    }
    Some(Uuid::from_u128(num))
}

/// Short id of a page uuid
#[must_use]
pub fn short_uuid(uuid: &Uuid) -> String {
    let mut num = uuid.as_u128();
    let mut digits = Vec::new();
    while num > 0 {
        digits.push(BASE58[(num % 58) as usize]);
        num /= 58;
    }
    digits.iter().rev().map(|&d| char::from(d)).collect()
}

pub struct Helpkit;

/// An article card found while listing
struct Listing {
    short_id: String,
    title: String,
    slug: String,
    description: Option<String>,
    href: String,
    category: CategoryId,
}

#[async_trait(?Send)]
impl Platform for Helpkit {
    fn name(&self) -> &'static str {
        "helpkit"
    }

    async fn load(
        &self,
        session: &mut Session<'_>,
        base_url: &str,
        _language: Option<&str>,
    ) -> Result<()> {
        let base_url = base_url.trim_end_matches('/').to_string();
        session.add_language("en", &base_url)?;

        let home = session.get_html(&base_url).await?;
        let cards = category_cards(&home)?;
        info!(count = cards.len(), "Found categories");

        let mut listings = Vec::new();
        // "/<page uuid>" -> article URL
        let mut articles = HashMap::new();

        for card in cards {
            let url = session.resolve(&card.href)?;
            let category = session.save_category(
                None,
                NewCategory {
                    title: card.title,
                    slug: Some(card.slug),
                    icon: card.icon.clone(),
                    description: card.description,
                    url: Some(url),
                    ..Default::default()
                },
            )?;

            let page = session.get_html(&card.href).await?;
            let groups: Vec<_> = page.html.select(&SUBCOLLECTIONS).collect();

            for group in &groups {
                let current = if groups.len() > 1 {
                    // only worth a level when there are several
                    session.save_category(
                        Some(&category),
                        NewCategory {
                            title: text_of(select_one(*group, &SUBCOLLECTION_TITLE, "h2", &page.url)?),
                            icon: card.icon.clone(),
                            ..Default::default()
                        },
                    )?
                } else {
                    category.clone()
                };

                for link in group.select(&ARTICLE_CARDS) {
                    let href = attr(link, "href", &page.url)?.to_string();
                    let mut sections = href.trim_start_matches('/').rsplit('/');
                    let (Some(short_id), Some(slug)) = (sections.next(), sections.next()) else {
                        return Err(ParseError::shape(&page.url, format!("article link `{href}`")).into());
                    };
                    let uuid = long_uuid(short_id).ok_or_else(|| {
                        ParseError::shape(&page.url, format!("article id `{short_id}`"))
                    })?;

                    articles.insert(format!("/{}", uuid.simple()), format!("{base_url}{href}"));
                    listings.push(Listing {
                        short_id: short_id.to_string(),
                        slug: slug.to_string(),
                        title: text_of(select_one(link, &ARTICLE_TITLE, "h3", &page.url)?),
                        description: select_first(link, &ARTICLE_DESCRIPTION)
                            .map(text_of)
                            .filter(|d| !d.is_empty()),
                        href,
                        category: current.clone(),
                    });
                }
            }
        }

        info!(count = listings.len(), "Found articles");

        // short id -> stored article
        let mut seen = HashMap::new();
        for listing in listings {
            if let Some(id) = seen.get(&listing.short_id) {
                session.add_article_to_category(id, &listing.category)?;
                continue;
            }

            let page = session.get_html(&listing.href).await?;
            let rules = ContentRules {
                base_url: &base_url,
                url: &page.url,
                articles: &articles,
            };
            let content = article_content(&page, &listing.short_id, &rules)?;
            let last_updated = select_first(&page.html, &UPDATED).and_then(|p| {
                let text = text_of(p);
                parse_date(text.trim_start_matches("Last updated on"), &["%B %d, %Y"])
            });

            let id = session.save_article(
                Some(&listing.category),
                NewArticle {
                    title: listing.title,
                    slug: Some(listing.slug),
                    description: listing.description,
                    previous_url: listing.href,
                    last_updated,
                    content,
                    ..Default::default()
                },
            )?;
            seen.insert(listing.short_id, id);
        }

        Ok(())
    }
}

struct CategoryCard {
    href: String,
    slug: String,
    title: String,
    icon: Option<String>,
    description: Option<String>,
}

fn category_cards(home: &Document) -> Result<Vec<CategoryCard>> {
    let mut cards = Vec::new();
    for card in home.html.select(&CATEGORY_CARDS) {
        let href = attr(card, "href", &home.url)?.to_string();
        // `/<slug>/<short id>`
        let slug = match href.trim_matches('/').split('/').collect::<Vec<_>>()[..] {
            [slug, _] => slug.to_string(),
            _ => return Err(ParseError::shape(&home.url, format!("category link `{href}`")).into()),
        };

        cards.push(CategoryCard {
            slug,
            title: text_of(select_one(card, &CATEGORY_TITLE, "h2", &home.url)?),
            icon: select_first(card, &CATEGORY_ICON).map(text_of).filter(|i| !i.is_empty()),
            description: select_first(card, &CATEGORY_DESCRIPTION)
                .map(text_of)
                .filter(|d| !d.is_empty()),
            href,
        });
    }
    Ok(cards)
}

fn article_content(page: &Document, short_id: &str, rules: &ContentRules<'_>) -> Result<String> {
    let label = format!("#article-{short_id} main");
    let selector =
        Selector::parse(&label).map_err(|_| ParseError::shape(&page.url, format!("article id `{short_id}`")))?;
    let main = Element::from_ref(select_one(&page.html, &selector, &label, &page.url)?);
    if main.classes() != ["notion"] {
        return Err(ParseError::unknown(&page.url, main.describe()).into());
    }

    let nodes = normalize::normalize(rules, main.children)?;
    let nodes = normalize::merge_adjacent_lists(nodes);
    let nodes = normalize::remove_empty_paragraphs(nodes);
    Ok(normalize::render(&normalize::trim_whitespace(nodes), &page.url)?)
}

/// Move header and footer rows of a Notion table into `thead` and `tfoot`
///
/// A `caption` stays first; any other non-row child is unknown markup.
fn rebuild_table(mut table: Element, url: &str) -> std::result::Result<Element, ParseError> {
    let mut caption = None;
    let mut rows = Vec::new();
    for child in std::mem::take(&mut table.children) {
        let Node::Element(el) = child else { continue };
        match el.name.as_str() {
            "tr" => rows.push(el),
            "caption" if caption.is_none() => caption = Some(el),
            "thead" | "tbody" | "tfoot" => {
                for node in el.children {
                    match node {
                        Node::Element(row) if row.name == "tr" => rows.push(row),
                        Node::Element(other) => return Err(ParseError::unknown(url, other.describe())),
                        Node::Text(_) => {}
                    }
                }
            }
            _ => return Err(ParseError::unknown(url, el.describe())),
        }
    }

    if let Some(caption) = caption {
        table.children.push(caption.into());
    }

    let header_row = |mut row: Element| {
        for cell in row.children.iter_mut().filter_map(Node::as_element_mut) {
            if cell.name == "td" {
                cell.name = "th".into();
            }
        }
        Node::from(row)
    };

    let (mut head, mut body, mut foot) = (Vec::new(), Vec::new(), Vec::new());
    for row in rows {
        if row.find_class("notion-simple-table-header").is_some() {
            head.push(header_row(row));
        } else if row.find_class("notion-simple-table-footer").is_some() {
            foot.push(header_row(row));
        } else {
            body.push(Node::from(row));
        }
    }

    if !head.is_empty() {
        table.children.push(Element::new("thead").with_children(head).into());
    }
    table.children.push(Element::new("tbody").with_children(body).into());
    if !foot.is_empty() {
        table.children.push(Element::new("tfoot").with_children(foot).into());
    }
    Ok(table)
}

struct ContentRules<'a> {
    base_url: &'a str,
    url: &'a str,
    articles: &'a HashMap<String, String>,
}

impl ContentRules<'_> {
    fn unknown(&self, el: &Element) -> ParseError {
        ParseError::unknown(self.url, el.describe())
    }

    /// Remove `known` classes; anything left is unknown markup
    fn expect_classes(&self, el: &mut Element, known: &[&str]) -> std::result::Result<(), ParseError> {
        if el.remove_classes(known).is_empty() {
            Ok(())
        } else {
            Err(self.unknown(el))
        }
    }

    /// Article URL for an internal Notion link
    fn link_target(&self, href: &str) -> String {
        if !href.starts_with('/') {
            return href.to_string();
        }
        if let Some(url) = self.articles.get(href) {
            return url.clone();
        }

        let id = &href[1..];
        if id.len() == 32 && id.chars().all(|c| c.is_ascii_alphanumeric()) {
            warn!(url = %self.url, target = %href, "Link to an unknown page replaced by #");
            return "#".to_string();
        }
        href.to_string()
    }

    fn link(&self, mut a: Element, new_tab: bool) -> std::result::Result<Element, ParseError> {
        if let Some(href) = a.attr("href").map(|h| self.link_target(h)) {
            a.set_attr("href", href);
        }
        media::clean_link(a, self.base_url, self.url, new_tab)
    }

    fn bookmark(&self, a: &Element) -> std::result::Result<Action, ParseError> {
        let title = a
            .find_class("notion-bookmark-title")
            .map(|t| clean_text(&t.text()))
            .ok_or_else(|| self.unknown(a))?;
        let description = a
            .find_class("notion-bookmark-description")
            .map(|d| clean_text(&d.text()))
            .filter(|d| !d.is_empty());
        let image = a
            .find_class("notion-bookmark-image")
            .and_then(|wrapper| wrapper.find_tag("img"))
            .and_then(|img| img.attr("src"))
            .map(str::to_string);

        let caption = description.unwrap_or_else(|| title.clone());
        let children: Vec<Node> = match image {
            Some(src) => vec![media::figure(vec![
                Element::new("img").with_attr("src", src).with_attr("title", title.as_str()).into(),
                Element::new("figcaption").with_text(caption).into(),
            ])
            .into()],
            None => vec![Node::text(caption)],
        };

        let mut card = Element::new("a").with_attr("title", title.as_str());
        if let Some(href) = a.attr("href") {
            card.set_attr("href", href);
        }
        let card = self.link(card.with_children(children), true)?;
        Ok(Action::Replace(vec![card.into()]))
    }

    fn anchor(&self, mut a: Element) -> std::result::Result<Action, ParseError> {
        if a.has_class("notion-bookmark") {
            return self.bookmark(&a);
        }

        if a.has_class("notion-page-link") {
            let title = a
                .find_class("notion-page-text")
                .map(|t| clean_text(&t.text()))
                .ok_or_else(|| self.unknown(&a))?;
            self.expect_classes(&mut a, &["notion-link", "notion-page-link"])?;
            let a = self.link(a.with_text(title), false)?;
            return Ok(Action::Replace(vec![a.into()]));
        }

        self.expect_classes(&mut a, &["notion-link"])?;
        Ok(Action::Keep(self.link(a, false)?))
    }

    fn callout(&self, el: &Element) -> std::result::Result<Action, ParseError> {
        let color = el
            .classes()
            .into_iter()
            .filter_map(|c| c.strip_prefix("notion-"))
            .find(|c| c.ends_with("_background"))
            .unwrap_or("gray_background");
        let kind = callout_for_color(color).ok_or_else(|| self.unknown(el))?;
        let icon = el.find_class("notion-page-icon").is_some();

        let paragraphs: Vec<Node> = el
            .element_children()
            .filter(|child| child.has_class("notion-callout-text"))
            .map(|child| Element::new("p").with_children(child.children.clone()).into())
            .collect();
        Ok(Action::Keep(kind.wrap(paragraphs, icon)))
    }

    fn div(&self, el: Element) -> std::result::Result<Action, ParseError> {
        let classes = el.classes();

        if classes.is_empty() || (classes.len() == 1 && LAYOUT_DIVS.contains(&classes[0])) {
            return Ok(Action::Unwrap(el.children));
        }
        if classes.contains(&"notion-blank") {
            return Ok(Action::Drop);
        }
        if classes.contains(&"notion-asset-wrapper") {
            return match el.element_children().next() {
                Some(iframe) if iframe.name == "iframe" => {
                    Ok(Action::Replace(vec![media::video_embed(iframe.clone()).into()]))
                }
                _ => Err(self.unknown(&el)),
            };
        }
        if classes.contains(&"notion-callout") {
            return self.callout(&el);
        }
        Err(self.unknown(&el))
    }
}

impl Rules for ContentRules<'_> {
    fn element(&self, mut el: Element, ancestors: &[String]) -> std::result::Result<Action, ParseError> {
        if SELF_NESTING.contains(&el.name.as_str())
            && matches!(&el.children[..], [Node::Element(child)] if child.name == el.name)
        {
            return Ok(Action::Unwrap(el.children));
        }

        el.remove_attr("fragment");
        strip_to_dialect(&mut el);

        match el.name.as_str() {
            "ul" | "ol" => {
                if !el.remove_class("notion-list") {
                    return Err(self.unknown(&el));
                }
                self.expect_classes(&mut el, &["notion-list-disc", "notion-list-numbered"])?;
                if el.attr("start") == Some("1") {
                    el.remove_attr("start");
                }
                Ok(Action::Keep(el))
            }
            "li" | "strong" | "em" | "u" | "s" | "caption" | "thead" | "tbody" | "tfoot" | "th"
            | "tr" | "td" => {
                el.remove_attr("class");
                Ok(Action::Keep(el))
            }
            "b" => {
                el.remove_attr("class");
                el.name = "strong".into();
                Ok(Action::Keep(el))
            }
            "iframe" => Ok(Action::Replace(vec![media::clean_iframe(el).into()])),
            "div" => self.div(el),
            "span" => Ok(Action::Unwrap(el.children)),
            "pre" => {
                let language = el
                    .classes()
                    .into_iter()
                    .find(|c| c.starts_with("language-"))
                    .map(str::to_string);
                let mut code = Element::new("code").with_text(el.text());
                if let Some(language) = language {
                    code.set_classes(&[language]);
                }
                Ok(Action::Replace(vec![Element::new("pre").with_children(vec![code.into()]).into()]))
            }
            "code" => {
                self.expect_classes(&mut el, &["notion-inline-code"])?;
                let flat = el
                    .element_children()
                    .all(|child| child.name == "pre" || child.name == "code");
                if flat {
                    Ok(Action::Replace(vec![Element::new("code").with_text(el.text().trim()).into()]))
                } else {
                    Ok(Action::Keep(el))
                }
            }
            "hr" => {
                self.expect_classes(&mut el, &["notion-hr"])?;
                Ok(Action::Keep(el))
            }
            name if media::is_heading(name) => {
                let marker = format!("notion-{name}");
                self.expect_classes(&mut el, &[marker.as_str()])?;
                if el.name == "h1" {
                    el.name = "h2".into();
                }
                if !el.has_attr("id") {
                    el.set_attr("id", slugify(&el.text()));
                }
                Ok(Action::Keep(el))
            }
            "p" => {
                self.expect_classes(&mut el, &["notion-text"])?;
                Ok(Action::Keep(el))
            }
            "figure" => {
                self.expect_classes(&mut el, &["notion-asset-wrapper"])?;
                el.set_classes(&["align--center", "width--normal"]);
                Ok(Action::Keep(el))
            }
            "figcaption" => {
                self.expect_classes(&mut el, &["notion-image-caption"])?;
                Ok(Action::Keep(el))
            }
            "table" => {
                self.expect_classes(&mut el, &["notion-simple-table"])?;
                Ok(Action::Keep(rebuild_table(el, self.url)?))
            }
            "blockquote" => {
                self.expect_classes(&mut el, &["notion-quote"])?;
                Ok(Action::Keep(el))
            }
            "img" => {
                self.expect_classes(&mut el, &["notion-image-inset"])?;
                if el.attr("alt") == Some("Notion image") {
                    el.remove_attr("alt");
                }
                Ok(Action::Replace(vec![media::figure_image(
                    el,
                    ancestors.last().map(String::as_str),
                )]))
            }
            "a" => self.anchor(el),
            _ => Err(self.unknown(&el)),
        }
    }
}
