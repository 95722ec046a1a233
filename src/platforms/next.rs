//! Intercom and other Next.js rendered help centers
//!
//! Every page embeds its data in `script#__NEXT_DATA__`. The home page
//! carries the site theme, its links and the root collections; collection
//! pages list article summaries and sub-collections. Article bodies are
//! trees of typed blocks rendered straight into the output dialect.

use async_trait::async_trait;
use lazy_static::lazy_static;
use scraper::Selector;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info};
use url::Url;

use super::{Platform, Session};
use crate::error::Result;
use crate::models::{CategoryId, Link, LinkPosition, Metadata, NewArticle, NewCategory};
use crate::parse_selector;
use crate::parser::dom::{parse_fragment, Element, Node};
use crate::parser::media::{self, Callout, LINK_REL};
use crate::parser::normalize::{self, is_passthrough, strip_to_dialect, Action, Rules};
use crate::parser::selectors::select_first;
use crate::parser::json;
use crate::utils::error::ParseError;

lazy_static! {
    static ref NEXT_DATA: Selector = parse_selector!("script#__NEXT_DATA__");
}

pub struct Next;

#[async_trait(?Send)]
impl Platform for Next {
    fn name(&self) -> &'static str {
        "next"
    }

    async fn load(
        &self,
        session: &mut Session<'_>,
        base_url: &str,
        language: Option<&str>,
    ) -> Result<()> {
        let base_url = with_trailing_slash(base_url);
        session.add_language(language.unwrap_or("en"), &base_url)?;

        let home = next_data(session, &base_url).await?;
        let mut metadata = site_metadata(&home, &base_url)?;
        metadata.links = Some(site_links(&home, &base_url)?);
        session.set_metadata(metadata)?;

        let roots: Vec<CollectionEntry> =
            json::decode_at(&home, "/props/pageProps/home/collections", &base_url)?;
        info!(count = roots.len(), "Found collections");

        // article url -> stored article
        let mut seen = HashMap::new();
        let mut pending: Vec<(CollectionEntry, Option<CategoryId>)> =
            roots.into_iter().rev().map(|entry| (entry, None)).collect();

        while let Some((entry, parent)) = pending.pop() {
            let category = session.save_category(
                parent.as_ref(),
                NewCategory {
                    title: entry.name,
                    slug: entry.slug.filter(|s| !s.trim().is_empty()),
                    description: entry.description.filter(|s| !s.trim().is_empty()),
                    ..Default::default()
                },
            )?;

            let page = next_data(session, &entry.url).await?;
            let collection: Collection =
                json::decode_at(&page, "/props/pageProps/collection", &entry.url)?;

            for summary in collection.article_summaries {
                if let Some(id) = seen.get(&summary.url) {
                    session.add_article_to_category(id, &category)?;
                    continue;
                }

                let data = next_data(session, &summary.url).await?;
                let article = parse_article(&data, &session.resolve(&summary.url)?, &base_url)?;
                let id = session.save_article(Some(&category), article)?;
                seen.insert(summary.url, id);
            }

            pending.extend(
                collection
                    .subcollections
                    .into_iter()
                    .rev()
                    .map(|sub| (sub, Some(category.clone()))),
            );
        }

        Ok(())
    }
}

pub(crate) fn with_trailing_slash(url: &str) -> String {
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{url}/")
    }
}

/// Fetch a page and decode its `__NEXT_DATA__` payload
///
/// A page without the payload, or Next's not-found page, is evicted from
/// the cache before failing.
pub(crate) async fn next_data(session: &Session<'_>, url: &str) -> Result<Value> {
    let doc = session.get_html(url).await?;

    let Some(script) = select_first(&doc.html, &NEXT_DATA) else {
        session.evict(url).await?;
        return Err(ParseError::missing(doc.url.as_str(), "script#__NEXT_DATA__").into());
    };
    let text: String = script.text().collect();
    let data = json::parse(&text, &doc.url)?;

    if data.get("page").and_then(Value::as_str) == Some("/404") {
        session.evict(url).await?;
        return Err(ParseError::shape(doc.url.as_str(), "page not found").into());
    }

    debug!(url = %doc.url, "Decoded page data");
    Ok(data)
}

/// Path part of an absolute URL
pub(crate) fn url_path(url: &str) -> String {
    Url::parse(url).map_or_else(|_| url.to_string(), |u| u.path().to_string())
}

#[derive(Debug, Deserialize)]
struct CollectionEntry {
    name: String,
    slug: Option<String>,
    description: Option<String>,
    url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Collection {
    #[serde(default)]
    article_summaries: Vec<ArticleSummary>,
    #[serde(default)]
    subcollections: Vec<CollectionEntry>,
}

#[derive(Debug, Deserialize)]
struct ArticleSummary {
    url: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SortedLink {
    pub title: String,
    pub url: String,
    pub sort_order: i64,
}

#[derive(Debug, Deserialize)]
struct SocialLink {
    provider: String,
    url: String,
}

fn site_metadata(data: &Value, url: &str) -> Result<Metadata> {
    let theme = json::at(data, "/props/pageProps/theme", url)?;

    Ok(Metadata {
        title: Some(json::str_at(theme, "/siteName", url)?),
        favicon: Some(json::str_at(theme, "/favicon", url)?),
        custom_domain: json::opt_str(theme, "/customDomain"),
        logo: Some(json::str_at(theme, "/logo", url)?),
        accent_color: Some(format!("#{}", json::str_at(theme, "/color", url)?)),
        code: Some(json::str_at(theme, "/locale", url)?.to_uppercase()),
        description: json::opt_str(theme, "/headline"),
        company_name: Some(json::str_at(data, "/props/pageProps/app/name", url)?),
        company_url: json::opt_str(theme, "/homeUrl"),
        links: None,
    })
}

/// Footer links keep their sort keys, social links follow them
fn site_links(data: &Value, url: &str) -> Result<Vec<Link>> {
    const FOOTER: &str = "/props/pageProps/helpCenterSite/footerLinks/custom";
    const SOCIAL: &str = "/props/pageProps/helpCenterSite/footerLinks/social";
    const HEADER: &str = "/props/pageProps/helpCenterSite/headerLinks";

    let footer: Vec<SortedLink> = json::decode_at(data, FOOTER, url)?;
    let social: Vec<SocialLink> = match data.pointer(SOCIAL) {
        Some(value) if !value.is_null() => json::decode_at(data, SOCIAL, url)?,
        _ => Vec::new(),
    };
    let header: Vec<SortedLink> = json::decode_at(data, HEADER, url)?;

    let mut highest = footer.iter().map(|l| l.sort_order).max().unwrap_or(0).max(0);
    let mut links: Vec<Link> = footer
        .into_iter()
        .map(|l| Link::new(l.title, l.url, l.sort_order, LinkPosition::Footer))
        .collect();

    for link in social {
        highest += 1;
        links.push(Link::new(
            capitalize(&link.provider),
            link.url,
            highest,
            LinkPosition::Footer,
        ));
    }

    links.extend(
        header
            .into_iter()
            .map(|l| Link::new(l.title, l.url, l.sort_order, LinkPosition::Header)),
    );
    Ok(links)
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// `…/articles/123-how-to-pay` → `how-to-pay`
fn article_slug(url: &str) -> Option<String> {
    let path = url_path(url);
    let last = path.trim_end_matches('/').rsplit('/').next()?;
    let (_, slug) = last.split_once('-')?;
    (!slug.is_empty()).then(|| slug.to_string())
}

fn parse_article(data: &Value, url: &str, base_url: &str) -> Result<NewArticle> {
    let content = json::at(data, "/props/pageProps/articleContent", url)?;
    let blocks = json::at(content, "/blocks", url)?;
    let blocks = Vec::<Block>::deserialize(blocks).map_err(|e| ParseError::InvalidBlock {
        url: url.to_string(),
        detail: e.to_string(),
    })?;

    let nodes = BlockRenderer { url, base_url }.blocks(&blocks)?;
    let html = normalize::render(&nodes, url)?;

    Ok(NewArticle {
        title: json::str_at(content, "/title", url)?,
        description: json::opt_str(content, "/description"),
        slug: article_slug(url),
        previous_url: url_path(url),
        content: html,
        ..Default::default()
    })
}

/// Content block of an article body, tagged by `type`
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum Block {
    Paragraph(Paragraph),
    Image(Image),
    Heading(Heading),
    Subheading(Heading),
    Subheading3(Heading),
    Subheading4(Heading),
    Button(Button),
    UnorderedNestedList(NestedList),
    OrderedNestedList(NestedList),
    CollapsibleSection(CollapsibleSection),
    HorizontalRule,
    Code(Code),
    Video(Video),
    Callout(CalloutBlock),
    Table(Table),
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Align {
    Left,
    Center,
    Right,
    Justify,
}

impl Align {
    fn class(self) -> &'static str {
        match self {
            Self::Left => "align--left",
            Self::Center => "align--center",
            Self::Right => "align--right",
            Self::Justify => "align--justify",
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Paragraph {
    text: String,
    class: Option<String>,
    align: Option<Align>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct Image {
    url: String,
    width: Option<serde_json::Number>,
    height: Option<serde_json::Number>,
    display_width: Option<serde_json::Number>,
    text: Option<String>,
    align: Option<Align>,
    link_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct Heading {
    id_attribute: Option<String>,
    text: String,
    #[allow(dead_code)]
    tag: Option<String>,
    align: Option<Align>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct Button {
    text: String,
    link_url: String,
    button_style: String,
    align: Option<Align>,
}

#[derive(Debug, Deserialize)]
struct NestedList {
    items: Vec<ListItem>,
}

#[derive(Debug, Deserialize)]
struct ListItem {
    content: Vec<Block>,
}

#[derive(Debug, Deserialize)]
struct CollapsibleSection {
    summary: Box<Block>,
    content: Vec<Block>,
}

#[derive(Debug, Deserialize)]
struct Code {
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Video {
    provider: String,
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CalloutBlock {
    content: Vec<Block>,
    style: CalloutStyle,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalloutStyle {
    background_color: String,
}

#[derive(Debug, Deserialize)]
struct Table {
    responsive: bool,
    container: bool,
    stacked: bool,
    rows: Vec<Row>,
}

#[derive(Debug, Deserialize)]
struct Row {
    cells: Vec<Cell>,
}

#[derive(Debug, Deserialize)]
struct Cell {
    content: Vec<Block>,
}

/// Renders typed blocks into dialect nodes
struct BlockRenderer<'a> {
    url: &'a str,
    base_url: &'a str,
}

impl BlockRenderer<'_> {
    fn invalid(&self, detail: impl Into<String>) -> ParseError {
        ParseError::InvalidBlock {
            url: self.url.to_string(),
            detail: detail.into(),
        }
    }

    fn blocks(&self, blocks: &[Block]) -> std::result::Result<Vec<Node>, ParseError> {
        let mut out = Vec::new();
        for block in blocks {
            out.extend(self.block(block)?);
        }
        Ok(out)
    }

    /// Inline HTML carried by a block's `text`
    fn inline(&self, html: &str) -> std::result::Result<Vec<Node>, ParseError> {
        let rules = InlineRules {
            url: self.url,
            base_url: self.base_url,
        };
        normalize::normalize(&rules, parse_fragment(html))
    }

    fn block(&self, block: &Block) -> std::result::Result<Vec<Node>, ParseError> {
        let node: Node = match block {
            Block::Paragraph(p) => {
                if p.class.as_deref().is_some_and(|class| class != "no-margin") {
                    return Err(self.invalid(format!("paragraph class {:?}", p.class)));
                }
                if p.text.trim().is_empty() {
                    return Ok(Vec::new());
                }
                aligned(Element::new("p"), p.align)
                    .with_children(self.inline(&p.text)?)
                    .into()
            }
            Block::Image(image) => self.image(image),
            Block::Heading(h) => self.heading("h2", h)?,
            Block::Subheading(h) => self.heading("h3", h)?,
            Block::Subheading3(h) => self.heading("h4", h)?,
            Block::Subheading4(h) => self.heading("h5", h)?,
            Block::Button(button) => {
                if button.button_style != "solid" {
                    return Err(self.invalid(format!("button style `{}`", button.button_style)));
                }
                let text = self.inline(&button.text)?;
                let title = Element::new("span").with_children(text.clone()).text();
                let link = Element::new("a")
                    .with_attr("href", button.link_url.as_str())
                    .with_attr("title", title)
                    .with_class("action")
                    .with_attr("rel", LINK_REL)
                    .with_children(text);
                aligned(Element::new("p"), button.align)
                    .with_children(vec![link.into()])
                    .into()
            }
            Block::UnorderedNestedList(list) => self.list("ul", list)?,
            Block::OrderedNestedList(list) => self.list("ol", list)?,
            Block::CollapsibleSection(section) => Element::new("div")
                .with_class("collapsible")
                .with_children(vec![
                    Element::new("div")
                        .with_class("collapsible__header")
                        .with_children(self.block(&section.summary)?)
                        .into(),
                    Element::new("div")
                        .with_class("collapsible__content")
                        .with_children(self.blocks(&section.content)?)
                        .into(),
                ])
                .into(),
            Block::HorizontalRule => Element::new("hr").into(),
            Block::Code(code) => Element::new("pre")
                .with_children(vec![Element::new("code").with_text(code.text.trim()).into()])
                .into(),
            Block::Video(video) => {
                if video.provider != "wistia" {
                    return Err(self.invalid(format!("video provider `{}`", video.provider)));
                }
                media::video_embed_src(&format!("https://fast.wistia.net/embed/iframe/{}", video.id))
                    .into()
            }
            Block::Callout(callout) => {
                let kind = match callout.style.background_color.to_ascii_lowercase().as_str() {
                    "#e3e7fa80" | "#e8e8e880" => Callout::Info,
                    "#feedaf80" => Callout::Warning,
                    "#fed9db80" => Callout::Danger,
                    "#d7efdc80" => Callout::Success,
                    other => return Err(self.invalid(format!("callout color `{other}`"))),
                };
                kind.wrap(self.blocks(&callout.content)?, false).into()
            }
            Block::Table(table) => {
                if table.responsive || table.container || !table.stacked {
                    return Err(self.invalid("table layout other than stacked"));
                }
                let mut rows = Vec::with_capacity(table.rows.len());
                for row in &table.rows {
                    let mut cells = Vec::with_capacity(row.cells.len());
                    for cell in &row.cells {
                        cells.push(Element::new("td").with_children(self.blocks(&cell.content)?).into());
                    }
                    rows.push(Element::new("tr").with_children(cells).into());
                }
                Element::new("table").with_children(rows).into()
            }
        };
        Ok(vec![node])
    }

    fn image(&self, image: &Image) -> Node {
        let filename = image.url.rsplit('/').next().unwrap_or_default();
        let mut img = Element::new("img").with_attr("src", image.url.as_str());
        if let Some(width) = image.display_width.as_ref().or(image.width.as_ref()) {
            img.set_attr("width", width.to_string());
        }
        if let Some(height) = &image.height {
            img.set_attr("height", height.to_string());
        }
        let alt = image
            .text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(filename);
        img.set_attr("alt", alt);

        let mut figure = media::figure(vec![img.into()]);
        if let Some(align) = image.align {
            figure.set_classes(&[align.class(), "width--normal"]);
        }

        match &image.link_url {
            Some(href) => Element::new("a")
                .with_attr("href", href.as_str())
                .with_attr("target", "_blank")
                .with_attr("rel", LINK_REL)
                .with_children(vec![figure.into()])
                .into(),
            None => figure.into(),
        }
    }

    fn heading(&self, tag: &str, heading: &Heading) -> std::result::Result<Node, ParseError> {
        let children = self.inline(&heading.text)?;
        let id = heading
            .id_attribute
            .as_deref()
            .filter(|id| !id.is_empty() && !id.starts_with("h_"))
            .map_or_else(
                || media::heading_id(&Element::new(tag).with_children(children.clone())),
                str::to_string,
            );

        Ok(aligned(Element::new(tag), heading.align)
            .with_attr("id", id)
            .with_children(children)
            .into())
    }

    fn list(&self, tag: &str, list: &NestedList) -> std::result::Result<Node, ParseError> {
        let mut items = Vec::with_capacity(list.items.len());
        for item in &list.items {
            items.push(Element::new("li").with_children(self.blocks(&item.content)?).into());
        }
        Ok(Element::new(tag).with_children(items).into())
    }
}

fn aligned(el: Element, align: Option<Align>) -> Element {
    match align {
        Some(align) => el.with_class(align.class()),
        None => el,
    }
}

/// Rules for the inline markup of block texts
struct InlineRules<'a> {
    url: &'a str,
    base_url: &'a str,
}

impl Rules for InlineRules<'_> {
    fn element(&self, mut el: Element, _ancestors: &[String]) -> std::result::Result<Action, ParseError> {
        strip_to_dialect(&mut el);

        match el.name.as_str() {
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
            name if is_passthrough(name) => Ok(Action::Keep(el)),
            _ => Err(ParseError::unknown(self.url, el.describe())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms::testing::StaticSite;
    use serde_json::json;

    const BASE: &str = "https://help.example.com/en/";
    const URL: &str = "https://help.example.com/en/articles/42-pay-by-card";

    fn page(data: &Value) -> String {
        format!(
            r#"<html><body><div id="__next"></div><script id="__NEXT_DATA__" type="application/json">{data}</script></body></html>"#
        )
    }

    fn render(blocks: Value) -> std::result::Result<String, crate::error::Error> {
        let data = json!({
            "props": { "pageProps": { "articleContent": {
                "title": "Pay by card", "description": "How to pay", "blocks": blocks
            }}}
        });
        parse_article(&data, URL, BASE).map(|a| a.content)
    }

    #[test]
    fn test_article_fields() {
        let data = json!({
            "props": { "pageProps": { "articleContent": {
                "title": "Pay by card", "description": "How to pay",
                "blocks": [{ "type": "paragraph", "text": "Use <b>any</b> card" }]
            }}}
        });
        let article = parse_article(&data, URL, BASE).unwrap();

        assert_eq!(article.title, "Pay by card");
        assert_eq!(article.description.as_deref(), Some("How to pay"));
        assert_eq!(article.slug.as_deref(), Some("pay-by-card"));
        assert_eq!(article.previous_url, "/en/articles/42-pay-by-card");
        assert_eq!(article.content, "<p>Use <strong>any</strong> card</p>");
    }

    #[test]
    fn test_inline_links_resolve_against_base_url() {
        let html = render(json!([
            { "type": "paragraph", "text": r#"See <a href="billing">billing</a> or <a class="intercom-link" href="/en/collections/3-faq">FAQ</a>"# }
        ]))
        .unwrap();

        assert!(html.contains(r#"<a href="https://help.example.com/en/billing" rel="noopener noreferrer">billing</a>"#));
        assert!(html.contains(
            r#"<a href="https://help.example.com/en/collections/3-faq" rel="noopener noreferrer">FAQ</a>"#
        ));
    }

    #[test]
    fn test_headings_and_buttons() {
        let html = render(json!([
            { "type": "heading", "text": "First steps", "idAttribute": "h_1234" },
            { "type": "subheading", "text": "Setup", "idAttribute": "setup-anchor", "align": "center" },
            { "type": "button", "text": "Sign up", "linkUrl": "https://x.io/signup", "buttonStyle": "solid" }
        ]))
        .unwrap();

        assert!(html.contains(r#"<h2 id="first-steps">First steps</h2>"#));
        assert!(html.contains(r#"<h3 class="align--center" id="setup-anchor">Setup</h3>"#));
        assert!(html.contains(
            r#"<a href="https://x.io/signup" title="Sign up" class="action" rel="noopener noreferrer">Sign up</a>"#
        ));
    }

    #[test]
    fn test_nested_structures() {
        let html = render(json!([
            { "type": "unorderedNestedList", "items": [
                { "content": [{ "type": "paragraph", "text": "one" }] },
                { "content": [
                    { "type": "paragraph", "text": "two" },
                    { "type": "orderedNestedList", "items": [{ "content": [{ "type": "paragraph", "text": "2.1" }] }] }
                ]}
            ]},
            { "type": "callout", "style": { "backgroundColor": "#feedaf80" },
              "content": [{ "type": "paragraph", "text": "Careful" }] },
            { "type": "table", "responsive": false, "container": false, "stacked": true,
              "rows": [{ "cells": [{ "content": [{ "type": "paragraph", "text": "cell" }] }] }] },
            { "type": "collapsibleSection", "summary": { "type": "paragraph", "text": "More" },
              "content": [{ "type": "code", "text": "  x = 1  " }] },
            { "type": "horizontalRule" }
        ]))
        .unwrap();

        assert!(html.starts_with("<ul><li><p>one</p></li><li><p>two</p><ol><li><p>2.1</p></li></ol></li></ul>"));
        assert!(html.contains(r#"<div class="callout callout--warning"><p>Careful</p></div>"#));
        assert!(html.contains("<table><tr><td><p>cell</p></td></tr></table>"));
        assert!(html.contains(r#"<div class="collapsible__header"><p>More</p></div>"#));
        assert!(html.contains("<pre><code>x = 1</code></pre>"));
        assert!(html.ends_with("<hr>"));
    }

    #[test]
    fn test_image_and_video() {
        let html = render(json!([
            { "type": "image", "url": "https://cdn.x.io/img/card.png", "width": 1200, "displayWidth": 600,
              "height": 300, "linkUrl": "https://x.io" },
            { "type": "video", "provider": "wistia", "id": "abc123" }
        ]))
        .unwrap();

        assert!(html.contains(r#"<a href="https://x.io" target="_blank" rel="noopener noreferrer"><figure class="align--center width--normal">"#));
        assert!(html.contains(r#"<img src="https://cdn.x.io/img/card.png" width="600" height="300" alt="card.png">"#));
        assert!(html.contains("https://fast.wistia.net/embed/iframe/abc123?doNotTrack=true"));
    }

    #[test]
    fn test_unknown_block_fails_closed() {
        let err = render(json!([{ "type": "carousel", "slides": [] }])).unwrap_err();
        assert!(err.to_string().contains("carousel"));

        let err = render(json!([{ "type": "paragraph", "text": "x", "color": "red" }])).unwrap_err();
        assert!(err.to_string().contains("color"));

        let err = render(json!([{ "type": "callout", "style": { "backgroundColor": "#000000" }, "content": [] }]))
            .unwrap_err();
        assert!(err.to_string().contains("#000000"));

        let err = render(json!([{ "type": "paragraph", "text": "<blink>x</blink>" }])).unwrap_err();
        assert!(err.to_string().contains("<blink>"));
    }

    #[test]
    fn test_article_slug() {
        assert_eq!(article_slug(URL).as_deref(), Some("pay-by-card"));
        assert_eq!(article_slug("https://x.io/articles/42"), None);
    }

    #[test]
    fn test_site_links_sorting() {
        let data = json!({ "props": { "pageProps": { "helpCenterSite": {
            "footerLinks": {
                "custom": [{ "title": "Terms", "url": "https://x.io/t", "sort_order": 3 }],
                "social": [{ "provider": "twitter", "url": "https://twitter.com/x" }]
            },
            "headerLinks": [{ "title": "Home", "url": "https://x.io", "sort_order": 1 }]
        }}}});
        let links = site_links(&data, BASE).unwrap();
        let view: Vec<_> = links.iter().map(|l| (l.title.as_str(), l.sort, l.position)).collect();
        assert_eq!(
            view,
            vec![
                ("Terms", 3, LinkPosition::Footer),
                ("Twitter", 4, LinkPosition::Footer),
                ("Home", 1, LinkPosition::Header),
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_next_data_evicts_and_fails() {
        let site = StaticSite::new().page(BASE, "<html><body>maintenance</body></html>");
        let mut session = Session::new(&site);
        session.add_language("en", BASE).unwrap();

        let err = next_data(&session, BASE).await.unwrap_err();
        assert!(err.to_string().contains("__NEXT_DATA__"));
        assert_eq!(site.evictions(), vec![BASE.to_string()]);
    }

    #[tokio::test]
    async fn test_not_found_page_evicts_and_fails() {
        let site = StaticSite::new().page(BASE, page(&json!({ "page": "/404", "props": {} })));
        let mut session = Session::new(&site);
        session.add_language("en", BASE).unwrap();

        assert!(next_data(&session, BASE).await.is_err());
        assert_eq!(site.evictions().len(), 1);
    }

    #[tokio::test]
    async fn test_load_walks_collections_depth_first() {
        let home = json!({ "page": "/", "props": { "pageProps": {
            "app": { "name": "Acme" },
            "theme": { "siteName": "Acme Help", "favicon": "https://x.io/f.ico", "logo": "https://x.io/l.png",
                       "color": "ff0000", "locale": "en", "headline": "How can we help?" },
            "helpCenterSite": { "footerLinks": { "custom": [] }, "headerLinks": [] },
            "home": { "collections": [
                { "name": "Billing", "slug": "billing", "description": "Money", "url": "https://help.example.com/en/collections/1-billing" },
                { "name": "Account", "slug": "account", "description": "", "url": "https://help.example.com/en/collections/2-account" }
            ]}
        }}});
        let billing = json!({ "page": "/collection", "props": { "pageProps": { "collection": {
            "articleSummaries": [{ "url": URL }],
            "subcollections": [{ "name": "Invoices", "slug": "invoices", "description": null,
                                 "url": "https://help.example.com/en/collections/3-invoices" }]
        }}}});
        let invoices = json!({ "page": "/collection", "props": { "pageProps": { "collection": {
            "articleSummaries": [{ "url": URL }]
        }}}});
        let account = json!({ "page": "/collection", "props": { "pageProps": { "collection": {} }}});
        let article = json!({ "page": "/article", "props": { "pageProps": { "articleContent": {
            "title": "Pay by card", "description": null, "blocks": [{ "type": "paragraph", "text": "Hi" }]
        }}}});

        let site = StaticSite::new()
            .page(BASE, page(&home))
            .page("https://help.example.com/en/collections/1-billing", page(&billing))
            .page("https://help.example.com/en/collections/2-account", page(&account))
            .page("https://help.example.com/en/collections/3-invoices", page(&invoices))
            .page(URL, page(&article));
        let mut session = Session::new(&site);
        Next.load(&mut session, "https://help.example.com/en", None).await.unwrap();

        let store = session.store().unwrap();
        let titles: Vec<_> = store.categories().values().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Billing", "Invoices", "Account"]);
        assert_eq!(store.articles().len(), 1);

        let invoices = store.categories().values().find(|c| c.title == "Invoices").unwrap();
        assert_eq!(invoices.articles.len(), 1);
        assert!(invoices.parent.is_some());

        let metadata = store.metadata();
        assert_eq!(metadata.accent_color.as_deref(), Some("#ff0000"));
        assert_eq!(metadata.code.as_deref(), Some("EN"));
        assert_eq!(metadata.company_name.as_deref(), Some("Acme"));

        let article = store.articles().values().next().unwrap();
        assert_eq!(article.previous_url, URL);
        assert_eq!(article.slug, "pay-by-card");
    }
}
