//! Help Scout Docs sites
//!
//! Single language. Categories are listed on the home page, each category
//! page lists its articles; articles shared between categories are fetched
//! once.

use async_trait::async_trait;
use lazy_static::lazy_static;
use scraper::Selector;
use std::collections::HashMap;
use tracing::info;

use super::{Platform, Session};
use crate::error::Result;
use crate::models::{NewArticle, NewCategory};
use crate::parse_selector;
use crate::parser::dom::{Element, Node};
use crate::parser::media::{self, Callout};
use crate::parser::normalize::{self, is_passthrough, strip_to_dialect, Action, Rules};
use crate::parser::selectors::{attr, select_first, select_one, text_of};
use crate::parser::Document;
use crate::utils::error::ParseError;

lazy_static! {
    static ref CATEGORIES: Selector = parse_selector!("#contentArea .category-list>a.category");
    static ref MAIN: Selector = parse_selector!("section#main-content");
    static ref CATEGORY_TITLE: Selector = parse_selector!("hgroup#categoryHead h1");
    static ref CATEGORY_DESCRIPTION: Selector = parse_selector!("hgroup#categoryHead p.descrip");
    static ref ARTICLE_LINKS: Selector = parse_selector!(".articleList a");
    static ref ARTICLE_TITLE: Selector = parse_selector!("#main-content article#fullArticle h1");
    static ref ARTICLE: Selector = parse_selector!("article#fullArticle");
}

/// Layout classes of video containers
const VIDEO_CLASSES: &[&str] = &["u-centralize", "video", "video-vimeo", "video-responsive"];

pub struct Helpscout;

#[async_trait(?Send)]
impl Platform for Helpscout {
    fn name(&self) -> &'static str {
        "helpscout"
    }

    async fn load(
        &self,
        session: &mut Session<'_>,
        base_url: &str,
        _language: Option<&str>,
    ) -> Result<()> {
        let base_url = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        session.add_language("en", &base_url)?;

        let home = session.get_html(&base_url).await?;
        let category_links: Vec<String> = home
            .html
            .select(&CATEGORIES)
            .map(|a| attr(a, "href", &home.url).map(str::to_string))
            .collect::<std::result::Result<_, _>>()?;
        info!(count = category_links.len(), "Found categories");

        // article href -> stored article
        let mut seen = HashMap::new();

        for href in category_links {
            let page = session.get_html(&href).await?;
            let main = select_one(&page.html, &MAIN, "section#main-content", &page.url)?;
            let title = text_of(select_one(main, &CATEGORY_TITLE, "hgroup#categoryHead h1", &page.url)?);
            let description = select_first(main, &CATEGORY_DESCRIPTION).map(text_of);

            let category = session.save_category(
                None,
                NewCategory {
                    title,
                    description,
                    ..Default::default()
                },
            )?;

            let article_links: Vec<String> = main
                .select(&ARTICLE_LINKS)
                .map(|a| attr(a, "href", &page.url).map(str::to_string))
                .collect::<std::result::Result<_, _>>()?;

            for href in article_links {
                if let Some(id) = seen.get(&href) {
                    session.add_article_to_category(id, &category)?;
                    continue;
                }

                let article = session.get_html(&href).await?;
                let entry = parse_article(&article, &session.resolve(&href)?, &base_url)?;
                let id = session.save_article(Some(&category), entry)?;
                seen.insert(href, id);
            }
        }

        Ok(())
    }
}

fn parse_article(doc: &Document, previous_url: &str, base_url: &str) -> Result<NewArticle> {
    let title = text_of(select_one(&doc.html, &ARTICLE_TITLE, "article#fullArticle h1", &doc.url)?);
    let article = select_one(&doc.html, &ARTICLE, "article#fullArticle", &doc.url)?;

    let mut root = Element::from_ref(article);
    root.remove_first(|el| el.name == "h1");
    root.remove_first(|el| el.name == "a" && el.has_class("printArticle"));

    let rules = ArticleRules {
        base_url,
        url: &doc.url,
    };
    let nodes = normalize::normalize(&rules, root.children)?;
    let nodes = normalize::collapse_single_child_divs(nodes);
    let content = normalize::render(&normalize::trim_whitespace(nodes), &doc.url)?;

    Ok(NewArticle {
        title,
        content,
        previous_url: previous_url.to_string(),
        ..Default::default()
    })
}

struct ArticleRules<'a> {
    base_url: &'a str,
    url: &'a str,
}

impl Rules for ArticleRules<'_> {
    fn element(&self, mut el: Element, ancestors: &[String]) -> std::result::Result<Action, ParseError> {
        strip_to_dialect(&mut el);

        match el.name.as_str() {
            "img" => Ok(Action::Replace(vec![media::figure_image(
                el,
                ancestors.last().map(String::as_str),
            )])),
            "iframe" => Ok(Action::Replace(vec![media::video_embed(el).into()])),
            "p" | "div" if media::holds_only_images(&el) => Ok(Action::Unwrap(el.children)),
            name if media::is_heading(name) && el.find_tag("img").is_some() => {
                Ok(Action::Unwrap(el.children))
            }
            "b" => {
                el.name = "strong".into();
                Ok(Action::Keep(el))
            }
            "i" => {
                el.name = "em".into();
                Ok(Action::Keep(el))
            }
            "span" if el.attrs.is_empty() => Ok(Action::Unwrap(el.children)),
            "a" => {
                el.remove_attr("class");
                Ok(Action::Keep(media::clean_link(el, self.base_url, self.url, false)?))
            }
            "div" => {
                let rest = el.remove_classes(VIDEO_CLASSES);
                match rest.as_slice() {
                    [] => Ok(Action::Keep(el)),
                    [class] if class == "callout-blue" => {
                        el.remove_attr("class");
                        Ok(Action::Keep(Callout::Info.wrap(vec![Node::Element(el)], false)))
                    }
                    _ => Err(ParseError::unknown(self.url, el.describe())),
                }
            }
            name if is_passthrough(name) => Ok(Action::Keep(el)),
            _ => Err(ParseError::unknown(self.url, el.describe())),
        }
    }
}
