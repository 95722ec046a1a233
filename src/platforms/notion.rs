//! Public Notion sites
//!
//! Pages are read through the private `loadCachedPageChunk` endpoint. The
//! home page holds gallery views whose cards are the categories; a
//! category page lists its articles, `sub_sub_header` blocks opening a
//! sub-category. Article bodies are block records with rich-text titles.

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};
use uuid::Uuid;

use super::{Platform, Session};
use crate::error::Result;
use crate::models::{ArticleId, CategoryId, NewArticle, NewCategory};
use crate::parser::dom::{Element, Node};
use crate::parser::json as payload;
use crate::parser::media::{self, Callout, LINK_REL};
use crate::parser::normalize;
use crate::parser::sanitize::from_millis;
use crate::utils::error::ParseError;
use crate::utils::{origin, slugify};

const CHUNK_ENDPOINT: &str = "api/v3/loadCachedPageChunk";
const DEFAULT_IMAGE_WIDTH: u64 = 2000;

/// Callout variant of a Notion color (`gray`, `orange_background`, …)
pub(crate) fn callout_for_color(color: &str) -> Option<Callout> {
    match color.trim_end_matches("_background") {
        "gray" | "default" | "blue" | "purple" => Some(Callout::Info),
        "orange" | "yellow" | "brown" => Some(Callout::Warning),
        "red" | "pink" => Some(Callout::Danger),
        "green" => Some(Callout::Success),
        _ => None,
    }
}

pub struct Notion;

#[async_trait(?Send)]
impl Platform for Notion {
    fn name(&self) -> &'static str {
        "notion"
    }

    async fn load(
        &self,
        session: &mut Session<'_>,
        base_url: &str,
        _language: Option<&str>,
    ) -> Result<()> {
        let site = origin(base_url)
            .ok_or_else(|| ParseError::shape(base_url, "not an absolute URL"))?;
        session.add_language("en", &site)?;

        let home = load_chunk(session, &site, &page_id(base_url)?).await?;
        let views: IndexMap<String, Record> =
            payload::decode_at(&home, "/collection_view", base_url)?;

        // page id -> stored article
        let mut seen = HashMap::new();

        for (view_id, record) in &views {
            let view = record.readable(view_id, base_url)?;
            if view.kind != "gallery" {
                continue;
            }

            for collection_id in &view.page_sort {
                let id = parse_uuid(collection_id, base_url)?;
                let chunk = load_chunk(session, &site, &id).await?;
                let blocks = blocks_of(&chunk, &site)?;

                let roots: Vec<&Block> = blocks
                    .iter()
                    .map(|(id, record)| record.readable(id, &site))
                    .collect::<std::result::Result<Vec<_>, _>>()?
                    .into_iter()
                    .filter(|b| b.kind == "page" && b.parent_table.as_deref() == Some("collection"))
                    .collect();

                for root in roots {
                    load_category(session, &site, root, &blocks, &mut seen).await?;
                }
            }
        }

        Ok(())
    }
}

async fn load_category(
    session: &mut Session<'_>,
    site: &str,
    root: &Block,
    blocks: &IndexMap<String, Record>,
    seen: &mut HashMap<String, ArticleId>,
) -> Result<()> {
    let title = root.title(site)?;
    info!(title = %title, "Loading category");
    let root_id = session.save_category(None, NewCategory::titled(title))?;
    let mut current: CategoryId = root_id.clone();

    for element_id in &root.content {
        let element = readable(blocks, element_id, site)?;

        match element.kind.as_str() {
            "sub_sub_header" => {
                current = session.save_category(Some(&root_id), NewCategory::titled(element.title(site)?))?;
            }
            "page" => {
                if let Some(id) = seen.get(&element.id) {
                    session.add_article_to_category(id, &current)?;
                    continue;
                }

                let page_id = parse_uuid(&element.id, site)?;
                let chunk = load_chunk(session, site, &page_id).await?;
                let page_blocks = blocks_of(&chunk, site)?;
                let article = parse_page(&page_blocks, &element.id, site)?;
                let id = session.save_article(Some(&current), article)?;
                seen.insert(element.id.clone(), id);
            }
            other => debug!(kind = other, "Skipped category block"),
        }
    }

    Ok(())
}

/// Page id ending a Notion URL (`…/Billing-0f6e…`)
fn page_id(url: &str) -> std::result::Result<Uuid, ParseError> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let last = path.trim_end_matches('/').rsplit(['/', '-']).next().unwrap_or_default();
    parse_uuid(last, url)
}

fn parse_uuid(id: &str, url: &str) -> std::result::Result<Uuid, ParseError> {
    Uuid::parse_str(id).map_err(|e| ParseError::shape(url, format!("invalid page id `{id}`: {e}")))
}

/// `recordMap` of a page
async fn load_chunk(session: &Session<'_>, site: &str, id: &Uuid) -> Result<Value> {
    let body = json!({
        "page": { "id": id.hyphenated().to_string() },
        "limit": 100,
        "cursor": { "stack": [] },
        "chunkNumber": 0,
        "verticalColumns": false
    });
    let endpoint = format!("{site}/{CHUNK_ENDPOINT}");
    let response = session.post_json(&endpoint, &body).await?;
    debug!(page = %id, "Loaded page chunk");
    Ok(payload::at(&response, "/recordMap", &endpoint)?.clone())
}

fn blocks_of(chunk: &Value, url: &str) -> std::result::Result<IndexMap<String, Record>, ParseError> {
    match chunk.get("block") {
        Some(value) if !value.is_null() => payload::decode_at(chunk, "/block", url),
        _ => Ok(IndexMap::new()),
    }
}

#[derive(Debug, Deserialize)]
struct Record {
    role: String,
    value: Block,
}

impl Record {
    fn readable(&self, id: &str, url: &str) -> std::result::Result<&Block, ParseError> {
        if self.role != "reader" {
            return Err(ParseError::shape(url, format!("block {id} has role `{}`", self.role)));
        }
        if !self.value.alive {
            return Err(ParseError::shape(url, format!("block {id} is not alive")));
        }
        Ok(&self.value)
    }
}

#[derive(Debug, Deserialize)]
struct Block {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    alive: bool,
    /// Rich-text properties; each is a list of `[text, decorations?]` segments
    #[serde(default)]
    properties: HashMap<String, Vec<Value>>,
    #[serde(default)]
    content: Vec<String>,
    #[serde(default)]
    format: Value,
    space_id: Option<String>,
    created_time: Option<i64>,
    last_edited_time: Option<i64>,
    parent_table: Option<String>,
    #[serde(default)]
    page_sort: Vec<String>,
}

impl Block {
    fn property(&self, name: &str) -> &[Value] {
        self.properties.get(name).map_or(&[][..], Vec::as_slice)
    }

    /// Plain text of the title property
    fn title(&self, url: &str) -> std::result::Result<String, ParseError> {
        let title: String = self
            .property("title")
            .iter()
            .filter_map(|segment| segment.get(0).and_then(Value::as_str))
            .collect();
        if title.trim().is_empty() {
            return Err(ParseError::shape(url, format!("block {} has no title", self.id)));
        }
        Ok(title.trim().to_string())
    }
}

fn readable<'a>(
    blocks: &'a IndexMap<String, Record>,
    id: &str,
    url: &str,
) -> std::result::Result<&'a Block, ParseError> {
    blocks
        .get(id)
        .ok_or_else(|| ParseError::shape(url, format!("block {id} not found")))?
        .readable(id, url)
}

fn parse_page(blocks: &IndexMap<String, Record>, page_id: &str, site: &str) -> Result<NewArticle> {
    let page = readable(blocks, page_id, site)?;
    let title = page.title(site)?;
    let simple_id = page_id.replace('-', "");
    let previous_url = format!("{site}/{}-{simple_id}", slugify(&title));

    let renderer = BlockRenderer {
        blocks,
        site,
        url: &previous_url,
    };
    let mut visiting = HashSet::new();
    let nodes = renderer.children(&page.content, &mut visiting)?;
    let nodes = normalize::merge_adjacent_lists(nodes);
    let content = normalize::render(&nodes, &previous_url)?;

    Ok(NewArticle {
        title,
        content,
        created: page.created_time.and_then(from_millis),
        last_updated: page.last_edited_time.and_then(from_millis),
        previous_url,
        ..Default::default()
    })
}

struct BlockRenderer<'a> {
    blocks: &'a IndexMap<String, Record>,
    site: &'a str,
    url: &'a str,
}

impl BlockRenderer<'_> {
    fn invalid(&self, detail: impl Into<String>) -> ParseError {
        ParseError::InvalidBlock {
            url: self.url.to_string(),
            detail: detail.into(),
        }
    }

    fn children(
        &self,
        ids: &[String],
        visiting: &mut HashSet<String>,
    ) -> std::result::Result<Vec<Node>, ParseError> {
        let mut out = Vec::new();
        for id in ids {
            if !visiting.insert(id.clone()) {
                return Err(self.invalid(format!("block {id} contains itself")));
            }
            let block = readable(self.blocks, id, self.url)?;
            out.extend(self.block(block, visiting)?);
            visiting.remove(id);
        }
        Ok(out)
    }

    fn block(
        &self,
        block: &Block,
        visiting: &mut HashSet<String>,
    ) -> std::result::Result<Vec<Node>, ParseError> {
        let title = block.property("title");

        let node: Element = match block.kind.as_str() {
            "text" => {
                let children = if title.is_empty() {
                    self.children(&block.content, visiting)?
                } else {
                    self.rich_text(title)?
                };
                Element::new("p").with_children(children)
            }
            "image" => self.image(block)?,
            "numbered_list" | "bulleted_list" if title.is_empty() => return Ok(Vec::new()),
            "numbered_list" => {
                let mut list = Element::new("ol");
                if let Some(start) = block.format.get("list_start_index").and_then(Value::as_u64) {
                    if start != 1 {
                        list.set_attr("start", start.to_string());
                    }
                }
                list.with_children(vec![Element::new("li").with_children(self.rich_text(title)?).into()])
            }
            "bulleted_list" => Element::new("ul")
                .with_children(vec![Element::new("li").with_children(self.rich_text(title)?).into()]),
            "sub_header" | "sub_sub_header" | "callout" if title.is_empty() => return Ok(Vec::new()),
            "sub_header" => Element::new("h2").with_children(self.rich_text(title)?),
            "sub_sub_header" => Element::new("h3").with_children(self.rich_text(title)?),
            "callout" => {
                let color = block
                    .format
                    .get("block_color")
                    .and_then(Value::as_str)
                    .unwrap_or("default");
                let kind = callout_for_color(color)
                    .ok_or_else(|| self.invalid(format!("callout color `{color}`")))?;
                let text = Element::new("p").with_children(self.rich_text(title)?);
                kind.wrap(vec![text.into()], false)
            }
            other => return Err(self.invalid(format!("block type `{other}`"))),
        };

        Ok(vec![node.into()])
    }

    /// Image served through the site's image proxy
    fn image(&self, block: &Block) -> std::result::Result<Element, ParseError> {
        let single = |name: &str| -> std::result::Result<Option<String>, ParseError> {
            match block.property(name) {
                [] => Ok(None),
                [segment] => Ok(segment.get(0).and_then(Value::as_str).map(str::to_string)),
                _ => Err(self.invalid(format!("image {name} with several segments"))),
            }
        };

        let source = single("source")?.ok_or_else(|| self.invalid("image without source"))?;
        let caption = single("title")?;
        let space = block.space_id.as_deref().unwrap_or_default();
        let width = block
            .format
            .get("block_width")
            .and_then(Value::as_u64)
            .unwrap_or(DEFAULT_IMAGE_WIDTH);

        let encoded: String = url::form_urlencoded::byte_serialize(source.as_bytes()).collect();
        let src = format!(
            "{}/image/{}?table=block&id={}&spaceId={space}&width={width}&userId=&cache=v2",
            self.site,
            encoded.replace('+', "%20"),
            block.id
        );

        let mut img = Element::new("img").with_attr("src", src);
        if let Some(caption) = caption.filter(|c| !c.trim().is_empty()) {
            img.set_attr("alt", caption);
        }
        Ok(media::figure(vec![img.into()]))
    }

    fn rich_text(&self, segments: &[Value]) -> std::result::Result<Vec<Node>, ParseError> {
        let mut out = Vec::with_capacity(segments.len());
        for segment in segments {
            let text = segment
                .get(0)
                .and_then(Value::as_str)
                .ok_or_else(|| self.invalid(format!("rich text segment {segment}")))?;

            let mut node = Node::text(text);
            let decorations = segment.get(1).and_then(Value::as_array).map_or(&[][..], Vec::as_slice);
            // the first decoration is the outermost
            for decoration in decorations.iter().rev() {
                node = self.decorate(node, decoration)?.into();
            }
            out.push(node);
        }
        Ok(out)
    }

    fn decorate(&self, inner: Node, decoration: &Value) -> std::result::Result<Element, ParseError> {
        let name = decoration.get(0).and_then(Value::as_str).unwrap_or_default();
        let tag = match name {
            "b" => "strong",
            "i" => "em",
            "_" => "u",
            "s" => "s",
            "c" => "code",
            "a" => {
                let href = decoration
                    .get(1)
                    .and_then(Value::as_str)
                    .ok_or_else(|| self.invalid("link decoration without target"))?;
                let a = if href.starts_with('/') {
                    Element::new("a").with_attr("href", format!("{}{href}", self.site))
                } else {
                    Element::new("a").with_attr("href", href).with_attr("rel", LINK_REL)
                };
                return Ok(a.with_children(vec![inner]));
            }
            other => return Err(self.invalid(format!("text decoration `{other}`"))),
        };
        Ok(Element::new(tag).with_children(vec![inner]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms::testing::StaticSite;

    const SITE: &str = "https://acme.notion.site";
    const HOME: &str = "https://acme.notion.site/Help-Center-1f6e2a6b9c1d4e0f8a7b6c5d4e3f2a10";
    const COLLECTION: &str = "2a6b9c1d-4e0f-8a7b-6c5d-4e3f2a101f6e";
    const PAGE: &str = "3b7c0d2e-5f10-9b8c-7d6e-5f4a3b202a7f";

    fn record(value: Value) -> Value {
        json!({ "role": "reader", "value": value })
    }

    fn page_map() -> Value {
        json!({
            PAGE: record(json!({
                "id": PAGE, "type": "page", "alive": true,
                "properties": { "title": [["Reset your password"]] },
                "content": ["t1", "l1", "l2", "c1", "i1"],
                "created_time": 1_700_000_000_000_i64, "last_edited_time": 1_700_000_060_000_i64
            })),
            "t1": record(json!({ "id": "t1", "type": "text", "alive": true,
                "properties": { "title": [["Open "], ["settings", [["b"], ["a", "/settings-abc"]]], [" now"]] } })),
            "l1": record(json!({ "id": "l1", "type": "bulleted_list", "alive": true, "properties": { "title": [["one"]] } })),
            "l2": record(json!({ "id": "l2", "type": "bulleted_list", "alive": true, "properties": { "title": [["two", [["i"]]]] } })),
            "c1": record(json!({ "id": "c1", "type": "callout", "alive": true,
                "format": { "block_color": "gray_background" }, "properties": { "title": [["Heads up"]] } })),
            "i1": record(json!({ "id": "i1", "type": "image", "alive": true, "space_id": "sp",
                "properties": { "source": [["https://s3.aws/img one.png"]], "title": [["Screen"]] } }))
        })
    }

    fn page_blocks() -> IndexMap<String, Record> {
        serde_json::from_value(page_map()).unwrap()
    }

    #[test]
    fn test_page_id_from_url() {
        assert_eq!(
            page_id(HOME).unwrap().hyphenated().to_string(),
            "1f6e2a6b-9c1d-4e0f-8a7b-6c5d4e3f2a10"
        );
        assert!(page_id("https://acme.notion.site/Help").is_err());
    }

    #[test]
    fn test_parse_page() {
        let article = parse_page(&page_blocks(), PAGE, SITE).unwrap();

        assert_eq!(article.title, "Reset your password");
        assert_eq!(
            article.previous_url,
            "https://acme.notion.site/reset-your-password-3b7c0d2e5f109b8c7d6e5f4a3b202a7f"
        );
        assert_eq!(article.created.as_deref(), Some("2023-11-14T22:13:20"));
        assert!(article.content.starts_with(
            "<p>Open <strong><a href=\"https://acme.notion.site/settings-abc\">settings</a></strong> now</p>"
        ));
        assert!(article.content.contains("<ul><li>one</li><li><em>two</em></li></ul>"));
        assert!(article.content.contains("<div class=\"callout callout--info\"><p>Heads up</p></div>"));
        assert!(article.content.contains(
            "https://acme.notion.site/image/https%3A%2F%2Fs3.aws%2Fimg%20one.png?table=block&amp;id=i1&amp;spaceId=sp&amp;width=2000"
        ));
        assert!(article.content.contains("alt=\"Screen\""));
    }

    #[test]
    fn test_unknown_block_type_fails() {
        let mut blocks = page_blocks();
        let extra: Record = serde_json::from_value(record(
            json!({ "id": "x", "type": "toggle", "alive": true, "properties": { "title": [["x"]] } }),
        ))
        .unwrap();
        blocks.insert("x".into(), extra);
        if let Some(page) = blocks.get_mut(PAGE) {
            page.value.content.push("x".into());
        }

        let err = parse_page(&blocks, PAGE, SITE).unwrap_err();
        assert!(err.to_string().contains("toggle"));
    }

    #[test]
    fn test_dead_block_fails() {
        let mut blocks = page_blocks();
        if let Some(record) = blocks.get_mut("t1") {
            record.value.alive = false;
        }
        assert!(parse_page(&blocks, PAGE, SITE).is_err());
    }

    #[test]
    fn test_callout_colors() {
        assert_eq!(callout_for_color("gray_background"), Some(Callout::Info));
        assert_eq!(callout_for_color("orange_background"), Some(Callout::Warning));
        assert_eq!(callout_for_color("red"), Some(Callout::Danger));
        assert_eq!(callout_for_color("teal_background"), None);
    }

    #[tokio::test]
    async fn test_load_gallery() {
        let endpoint = format!("{SITE}/{CHUNK_ENDPOINT}");
        let home = json!({ "recordMap": { "collection_view": {
            "v1": record(json!({ "id": "v1", "type": "gallery", "alive": true, "page_sort": [COLLECTION] })),
            "v2": record(json!({ "id": "v2", "type": "table", "alive": true }))
        }}});
        let collection = json!({ "recordMap": { "block": {
            "root": record(json!({ "id": "root", "type": "page", "alive": true, "parent_table": "collection",
                "properties": { "title": [["Account"]] }, "content": ["h1", PAGE] })),
            "h1": record(json!({ "id": "h1", "type": "sub_sub_header", "alive": true,
                "properties": { "title": [["Security"]] } })),
            PAGE: record(json!({ "id": PAGE, "type": "page", "alive": true, "parent_table": "block",
                "properties": { "title": [["Reset your password"]] } }))
        }}});
        let page = json!({ "recordMap": { "block": page_map() } });

        let site = StaticSite::new()
            .post(&endpoint, "1f6e2a6b-9c1d-4e0f-8a7b-6c5d4e3f2a10", home)
            .post(&endpoint, COLLECTION, collection)
            .post(&endpoint, PAGE, page);
        let mut session = Session::new(&site);
        Notion.load(&mut session, HOME, None).await.unwrap();

        let store = session.store().unwrap();
        let titles: Vec<_> = store.categories().values().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Account", "Security"]);
        let security = store.categories().values().find(|c| c.title == "Security").unwrap();
        assert_eq!(security.articles.len(), 1);
        assert_eq!(store.base_url(), SITE);
    }
}
