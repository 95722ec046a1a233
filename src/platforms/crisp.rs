//! Crisp helpdesk sites
//!
//! Every language variant is announced by a `<link rel="alternate"
//! hreflang>` on the home page. Categories come from the home list, a
//! category section with more than one article becomes a sub-category, and
//! articles are identified by the short id ending their slug.

use async_trait::async_trait;
use lazy_static::lazy_static;
use scraper::Selector;
use std::collections::HashMap;
use tracing::info;

use super::{Platform, Session};
use crate::crawler::url::strip_language_segment;
use crate::error::Result;
use crate::models::{ArticleId, CategoryId, Metadata, NewArticle, NewCategory};
use crate::parse_selector;
use crate::parser::dom::{Element, Node};
use crate::parser::media::{self, Callout};
use crate::parser::normalize::{
    self, is_passthrough, retain_dialect_classes, strip_to_dialect, Action, Rules,
};
use crate::parser::sanitize::{clean_optional, parse_date};
use crate::parser::selectors::{attr, select_first, select_one, text_of};
use crate::parser::Document;
use crate::utils::error::ParseError;

lazy_static! {
    static ref ALTERNATES: Selector = parse_selector!(r#"head>link[rel="alternate"]"#);
    static ref TITLE: Selector = parse_selector!("title");
    static ref ICON: Selector = parse_selector!(r#"link[rel="icon"]"#);
    static ref LOGO: Selector = parse_selector!("a.csh-header-main-logo>img");
    static ref CATEGORIES: Selector =
        parse_selector!(r#"#body section[data-type="categories"] .csh-home-list>li"#);
    static ref BOX_LINK: Selector = parse_selector!(".csh-box-link");
    static ref BADGE: Selector = parse_selector!(".csh-category-badge");
    static ref LABEL: Selector = parse_selector!(".csh-home-list-label");
    static ref SECTIONS: Selector =
        parse_selector!("#body div.csh-category>section .csh-category-section");
    static ref SECTION_ARTICLES: Selector = parse_selector!("ul.csh-category-section-list>li");
    static ref SECTION_TITLE: Selector = parse_selector!("h6.csh-category-section-title");
    static ref ARTICLE_LINK: Selector = parse_selector!("a.csh-box-link");
    static ref MAIN: Selector = parse_selector!(".csh-article-content article");
    static ref HEADING: Selector = parse_selector!("h1");
    static ref UPDATED: Selector = parse_selector!("p.csh-article-content-updated");
    static ref DESCRIPTION: Selector = parse_selector!(r#"meta[name="description"]"#);
    static ref CONTENT: Selector = parse_selector!(".csh-article-content-text");
}

/// Decorations removed from the article body before normalization
const CHROME_CLASSES: &[&str] = &[
    "csh-article-content-separate-top",
    "csh-article-content-updated",
    "csh-article-content-separate-bottom",
];

pub struct Crisp;

#[async_trait(?Send)]
impl Platform for Crisp {
    fn name(&self) -> &'static str {
        "crisp"
    }

    async fn load(
        &self,
        session: &mut Session<'_>,
        base_url: &str,
        language: Option<&str>,
    ) -> Result<()> {
        let base_url = strip_language_segment(base_url);
        let home = session.get_html(&base_url).await?;

        let alternates: Vec<(String, String)> = home
            .html
            .select(&ALTERNATES)
            .map(|link| {
                Ok((
                    attr(link, "hreflang", &home.url)?.to_string(),
                    attr(link, "href", &home.url)?.to_string(),
                ))
            })
            .collect::<std::result::Result<_, ParseError>>()?;

        for (code, href) in alternates {
            if language.is_some_and(|wanted| !wanted.eq_ignore_ascii_case(&code)) {
                continue;
            }

            session.add_language(&code, &href)?;
            if href == home.url {
                load_language(session, &home).await?;
            } else {
                let page = session.get_html(&href).await?;
                load_language(session, &page).await?;
            }
        }

        Ok(())
    }
}

async fn load_language(session: &mut Session<'_>, home: &Document) -> Result<()> {
    info!(language = ?session.current_language(), "Loading language");

    session.set_metadata(Metadata {
        title: select_first(&home.html, &TITLE).map(text_of),
        favicon: select_first(&home.html, &ICON)
            .and_then(|el| el.value().attr("href"))
            .map(str::to_string),
        logo: select_first(&home.html, &LOGO)
            .and_then(|el| el.value().attr("src"))
            .map(str::to_string),
        ..Default::default()
    })?;

    struct Entry {
        url: String,
        title: String,
        description: Option<String>,
    }

    let entries: Vec<Entry> = home
        .html
        .select(&CATEGORIES)
        .map(|li| {
            let link = select_one(li, &BOX_LINK, ".csh-box-link", &home.url)?;
            Ok(Entry {
                url: attr(link, "href", &home.url)?.to_string(),
                title: text_of(select_one(li, &BADGE, ".csh-category-badge", &home.url)?),
                description: clean_optional(
                    select_first(li, &LABEL).map(text_of).as_deref(),
                ),
            })
        })
        .collect::<std::result::Result<_, ParseError>>()?;

    // short article id -> stored article
    let mut seen: HashMap<String, ArticleId> = HashMap::new();

    for entry in entries {
        let url = session.resolve(&entry.url)?;
        let root = session.save_category(
            None,
            NewCategory {
                title: entry.title,
                url: Some(url.clone()),
                description: entry.description,
                ..Default::default()
            },
        )?;

        let page = session.get_html(&url).await?;
        let sections = category_sections(&page)?;

        for (section_title, links) in sections {
            let category = match section_title {
                Some(title) if links.len() > 1 => {
                    session.save_category(Some(&root), NewCategory::titled(title))?
                }
                _ => root.clone(),
            };

            for link in links {
                let id = article_id(&link, &page.url)?;
                if let Some(existing) = seen.get(&id) {
                    session.add_article_to_category(existing, &category)?;
                    continue;
                }

                let stored = load_article(session, &link, &category).await?;
                seen.insert(id, stored);
            }
        }
    }

    Ok(())
}

/// `(section title, article links)` of a category page
fn category_sections(page: &Document) -> Result<Vec<(Option<String>, Vec<String>)>> {
    let mut sections = Vec::new();
    for section in page.html.select(&SECTIONS) {
        let links = section
            .select(&SECTION_ARTICLES)
            .map(|li| {
                let a = select_one(li, &ARTICLE_LINK, "a.csh-box-link", &page.url)?;
                Ok(attr(a, "href", &page.url)?.to_string())
            })
            .collect::<std::result::Result<Vec<_>, ParseError>>()?;
        let title = select_first(section, &SECTION_TITLE)
            .map(text_of)
            .filter(|t| !t.is_empty());
        sections.push((title, links));
    }
    Ok(sections)
}

/// Short id ending the last path segment (`/article/reset-password-1x2y3z/`)
fn article_id(href: &str, page_url: &str) -> std::result::Result<String, ParseError> {
    let id = href
        .trim_matches('/')
        .rsplit('/')
        .next()
        .and_then(|segment| segment.rsplit('-').next())
        .unwrap_or_default();

    if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ParseError::shape(page_url, format!("Invalid article id in {href}")));
    }
    Ok(id.to_string())
}

async fn load_article(
    session: &mut Session<'_>,
    href: &str,
    category: &CategoryId,
) -> Result<ArticleId> {
    let page = session.get_html(href).await?;
    let entry = parse_article(&page, &session.base_url()?)?;
    session.save_article(Some(category), entry)
}

fn parse_article(page: &Document, base_url: &str) -> Result<NewArticle> {
    let main = select_one(&page.html, &MAIN, ".csh-article-content article", &page.url)?;
    let title = text_of(select_one(main, &HEADING, "h1", &page.url)?);

    let updated = text_of(select_one(main, &UPDATED, "p.csh-article-content-updated", &page.url)?);
    let last_word = updated.rsplit(' ').next().unwrap_or_default();
    let last_updated = parse_date(last_word, &["%d/%m/%Y"]).ok_or_else(|| {
        ParseError::shape(&page.url, format!("Unrecognized update date `{updated}`"))
    })?;

    let description = select_first(&page.html, &DESCRIPTION)
        .and_then(|meta| meta.value().attr("content"))
        .and_then(|d| clean_optional(Some(d)));

    let body = select_one(main, &CONTENT, ".csh-article-content-text", &page.url)?;
    let content = normalize_content(Element::from_ref(body), base_url, &page.url)?;

    Ok(NewArticle {
        title,
        content,
        previous_url: page.url.clone(),
        description,
        last_updated: Some(last_updated),
        ..Default::default()
    })
}

fn normalize_content(mut body: Element, base_url: &str, url: &str) -> Result<String> {
    for class in CHROME_CLASSES {
        body.remove_first(|el| el.has_class(class));
    }

    let rules = ContentRules { base_url, url };
    let nodes = normalize::normalize(&rules, body.children)?;
    let nodes = normalize::merge_adjacent_lists(nodes);
    let nodes = normalize::collapse_single_child_divs(nodes);
    Ok(normalize::render(&normalize::trim_whitespace(nodes), url)?)
}

/// Emoji for a Crisp smiley name
fn smiley(name: &str) -> Option<&'static str> {
    let emoji = match name {
        "angry" => "😠",
        "blushing" => "😊",
        "confused" => "😕",
        "cool" => "😎",
        "crying" => "😢",
        "embarrassed" => "😳",
        "heart" => "❤️",
        "laughing" => "😆",
        "sad" => "😞",
        "sick" => "🤒",
        "small-smile" => "🙂",
        "big-smile" => "😀",
        "thumbs-up" => "👍",
        "surprised" => "😮",
        "tongue" => "😛",
        "winking" => "😉",
        _ => return None,
    };
    Some(emoji)
}

struct ContentRules<'a> {
    base_url: &'a str,
    url: &'a str,
}

impl ContentRules<'_> {
    fn unknown(&self, el: &Element) -> ParseError {
        ParseError::unknown(self.url, el.describe())
    }

    fn renamed(mut el: Element, name: &str) -> Action {
        el.name = name.to_string();
        el.remove_attr("class");
        Action::Keep(el)
    }

    fn emphasis(&self, el: Element, data_type: Option<&str>) -> std::result::Result<Action, ParseError> {
        let variant = match data_type {
            Some("|") => Callout::Success,
            Some("||") => Callout::Info,
            Some("|||") => Callout::Warning,
            _ => return Err(self.unknown(&el)),
        };
        Ok(Action::Keep(variant.wrap(el.children, false)))
    }

    fn list_item(&self, mut el: Element, data_type: Option<&str>) -> std::result::Result<Action, ParseError> {
        let list = match data_type {
            Some("*") => "ul",
            Some(n) if n.parse::<u32>().is_ok() => "ol",
            _ => return Err(self.unknown(&el)),
        };
        el.name = "li".into();
        el.remove_attr("class");
        Ok(Action::Keep(Element::new(list).with_children(vec![el.into()])))
    }
}

impl Rules for ContentRules<'_> {
    fn element(&self, mut el: Element, ancestors: &[String]) -> std::result::Result<Action, ParseError> {
        let data_type = el.attr("data-type").map(str::to_string);
        let data_name = el.attr("data-name").map(str::to_string);
        strip_to_dialect(&mut el);
        el.remove_attr("data-copied");

        let classes: Vec<String> = el
            .classes()
            .into_iter()
            .filter(|c| *c != "csh-markdown")
            .map(str::to_string)
            .collect();
        let has = |class: &str| classes.iter().any(|c| c == class);

        match el.name.as_str() {
            "img" => {
                return Ok(Action::Replace(vec![media::figure_image(
                    el,
                    ancestors.last().map(String::as_str),
                )]))
            }
            "p" | "div" | "span" if media::holds_only_images(&el) => {
                return Ok(Action::Unwrap(el.children))
            }
            "br" => return Ok(Self::renamed(el, "br")),
            "a" => {
                el.remove_attr("class");
                return Ok(Action::Keep(media::clean_link(el, self.base_url, self.url, true)?));
            }
            name if media::is_heading(name) => {
                let demoted = media::demote_heading(name);
                return Ok(Self::renamed(el, &demoted));
            }
            "table" | "thead" | "tbody" | "tr" | "td" | "th" => {
                el.remove_attr("class");
                return Ok(Action::Keep(el));
            }
            "pre" => {
                el.remove_attr("class");
                return Ok(Action::Keep(el));
            }
            "code" => {
                retain_dialect_classes(&mut el);
                return Ok(Action::Keep(el));
            }
            _ => {}
        }

        if has("csh-markdown-video") {
            Ok(Action::Unwrap(el.children))
        } else if has("csh-markdown-video-wrap") {
            let iframe = el
                .find_tag("iframe")
                .cloned()
                .ok_or_else(|| self.unknown(&el))?;
            Ok(Action::Replace(vec![media::video_embed(iframe).into()]))
        } else if has("csh-markdown-emphasis") {
            self.emphasis(el, data_type.as_deref())
        } else if has("csh-markdown-image") {
            Ok(Action::Unwrap(el.children))
        } else if has("csh-markdown-bold") {
            Ok(Self::renamed(el, "strong"))
        } else if has("csh-markdown-italic") {
            Ok(Self::renamed(el, "em"))
        } else if has("csh-markdown-underline") {
            Ok(Self::renamed(el, "u"))
        } else if has("csh-markdown-delete") {
            Ok(Self::renamed(el, "s"))
        } else if has("csh-markdown-color") {
            Ok(Action::Keep(Callout::Info.wrap(el.children, false)))
        } else if has("csh-markdown-list") {
            self.list_item(el, data_type.as_deref())
        } else if has("csh-markdown-line") {
            Ok(Action::Replace(vec![Element::new("br").into()]))
        } else if has("csh-markdown-code-clipboard") {
            Ok(Action::Drop)
        } else if has("csh-markdown-code-inline") {
            Ok(Self::renamed(el, "code"))
        } else if has("csh-markdown-blockquote") {
            Ok(Self::renamed(el, "blockquote"))
        } else if has("csh-smiley") {
            let emoji = data_name
                .as_deref()
                .and_then(smiley)
                .ok_or_else(|| self.unknown(&el))?;
            Ok(Action::Replace(vec![Node::text(emoji)]))
        } else if !classes.is_empty() {
            Err(self.unknown(&el))
        } else {
            el.remove_attr("class");
            match el.name.as_str() {
                "span" => Ok(Action::Unwrap(el.children)),
                "div" => Ok(Action::Keep(el)),
                name if is_passthrough(name) => Ok(Action::Keep(el)),
                _ => Err(self.unknown(&el)),
            }
        }
    }
}
