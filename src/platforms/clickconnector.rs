//! ClickConnector portals
//!
//! Next.js sites like [`super::next`], with portal settings in the page data
//! and article bodies produced by the Lexical editor.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{info, warn};

use super::next::{next_data, with_trailing_slash, SortedLink};
use super::{Platform, Session};
use crate::error::Result;
use crate::models::{CategoryId, Link, LinkPosition, Metadata, NewArticle, NewCategory};
use crate::parser::dom::{parse_fragment, Element, Node};
use crate::parser::json;
use crate::parser::media;
use crate::parser::normalize::{self, is_passthrough, strip_to_dialect, Action, Rules};
use crate::parser::sanitize::{from_millis, parse_rfc3339};
use crate::utils::error::ParseError;
use crate::utils::slugify;

/// Editor theme classes carrying no meaning in the output
const THEME_CLASSES: &[&str] = &[
    "PlaygroundEditorTheme__paragraph",
    "PlaygroundEditorTheme__textBold",
    "PlaygroundEditorTheme__textItalic",
    "PlaygroundEditorTheme__textUnderline",
    "PlaygroundEditorTheme__textStrikethrough",
    "PlaygroundEditorTheme__textCode",
    "PlaygroundEditorTheme__ul",
    "PlaygroundEditorTheme__ol1",
    "PlaygroundEditorTheme__ol2",
    "PlaygroundEditorTheme__ol3",
    "PlaygroundEditorTheme__listItem",
    "PlaygroundEditorTheme__nestedListItem",
    "PlaygroundEditorTheme__link",
    "PlaygroundEditorTheme__h1",
    "PlaygroundEditorTheme__h2",
    "PlaygroundEditorTheme__h3",
    "PlaygroundEditorTheme__h4",
    "PlaygroundEditorTheme__h5",
    "PlaygroundEditorTheme__h6",
    "PlaygroundEditorTheme__quote",
    "PlaygroundEditorTheme__table",
    "PlaygroundEditorTheme__tableCell",
    "PlaygroundEditorTheme__tableCellHeader",
    "keyword",
];

const LINK_REL: &str = "nofollow noopener noreferrer";

pub struct ClickConnector;

#[async_trait(?Send)]
impl Platform for ClickConnector {
    fn name(&self) -> &'static str {
        "clickconnector"
    }

    async fn load(
        &self,
        session: &mut Session<'_>,
        base_url: &str,
        language: Option<&str>,
    ) -> Result<()> {
        let base_url = with_trailing_slash(base_url);
        let language = language.unwrap_or("en");
        session.add_language(language, &base_url)?;

        let home = next_data(session, &base_url).await?;
        let portal = json::at(&home, "/props/pageProps/portalConfig/data", &base_url)?;
        session.set_metadata(portal_metadata(portal, language, &base_url)?)?;

        let mut collections: Vec<Entry> =
            json::decode_at(&home, "/props/pageProps/collections", &base_url)?;
        let order: Vec<String> = json::decode_at(portal, "/collections/collectionOrder", &base_url)?;

        // ordered collections first, the others in page order
        let mut roots = Vec::with_capacity(collections.len());
        for id in &order {
            match collections.iter().position(|c| &c.id == id) {
                Some(index) => roots.push(collections.remove(index)),
                None => warn!(collection = %id, "Ordered collection not found"),
            }
        }
        roots.append(&mut collections);
        info!(count = roots.len(), "Found collections");

        // article id -> stored article
        let mut seen = HashMap::new();
        let mut pending: Vec<(Entry, Option<CategoryId>)> =
            roots.into_iter().rev().map(|entry| (entry, None)).collect();

        while let Some((entry, parent)) = pending.pop() {
            let slug = slugify(&entry.label);
            let category = session.save_category(
                parent.as_ref(),
                NewCategory {
                    title: entry.label.clone(),
                    slug: Some(slug.clone()).filter(|s| !s.is_empty()),
                    description: entry.description.filter(|s| !s.trim().is_empty()),
                    ..Default::default()
                },
            )?;

            let path = format!("collections/{slug}-{}", entry.id);
            let page = next_data(session, &path).await?;
            let articles: Vec<Entry> = match page.pointer("/props/pageProps/articles") {
                Some(value) if !value.is_null() => json::decode_at(&page, "/props/pageProps/articles", &path)?,
                _ => Vec::new(),
            };

            for article in articles {
                if let Some(id) = seen.get(&article.id) {
                    session.add_article_to_category(id, &category)?;
                    continue;
                }

                let slug = slugify(article.title());
                let path = format!("articles/{slug}-{}", article.id);
                let data = next_data(session, &path).await?;
                let url = session.resolve(&path)?;
                let new_article = parse_article(&data, &url, &base_url, slug)?;
                let id = session.save_article(Some(&category), new_article)?;
                seen.insert(article.id, id);
            }

            let subcollections: Vec<Entry> = json::opt_array(&page, "/props/pageProps/collection/subcollections")
                .iter()
                .map(|value| Entry::deserialize(value))
                .collect::<std::result::Result<_, _>>()
                .map_err(|source| ParseError::InvalidJson {
                    url: path.clone(),
                    source,
                })?;
            pending.extend(
                subcollections
                    .into_iter()
                    .rev()
                    .map(|sub| (sub, Some(category.clone()))),
            );
        }

        Ok(())
    }
}

/// Collection or article reference; collections carry `label`, articles `title`
#[derive(Debug, Deserialize)]
struct Entry {
    id: String,
    #[serde(default, alias = "title")]
    label: String,
    #[serde(default)]
    description: Option<String>,
}

impl Entry {
    fn title(&self) -> &str {
        &self.label
    }
}

fn portal_metadata(portal: &Value, language: &str, url: &str) -> Result<Metadata> {
    let buttons = json::opt_array(portal, "/navBar/buttons");
    if !buttons.is_empty() {
        return Err(ParseError::shape(url, "navigation bar buttons are not supported").into());
    }

    let custom_domain = portal
        .pointer("/domain/customDomainConfig/isVerified")
        .and_then(Value::as_bool)
        .unwrap_or(false)
        .then(|| json::opt_str(portal, "/domain/customDomainConfig/domain"))
        .flatten();

    let nav: Vec<SortedLink> = json::decode_at(portal, "/navBar/links", url)?;
    let social: Vec<SortedLink> = json::decode_at(portal, "/footer/socialLinks", url)?;
    let sections: Vec<SortedLink> = json::decode_at(portal, "/footer/linkSections", url)?;

    let links = nav
        .into_iter()
        .map(|l| Link::new(l.title, l.url, l.sort_order, LinkPosition::Header))
        .chain(
            social
                .into_iter()
                .chain(sections)
                .map(|l| Link::new(l.title, l.url, l.sort_order, LinkPosition::Footer)),
        )
        .collect();

    Ok(Metadata {
        title: Some(json::str_at(portal, "/siteName", url)?),
        favicon: json::opt_str(portal, "/seo/favicon"),
        description: json::opt_str(portal, "/seo/description"),
        logo: json::opt_str(portal, "/navBar/logo"),
        accent_color: json::opt_str(portal, "/appearance/primaryColor"),
        code: Some(language.to_uppercase()),
        custom_domain,
        links: Some(links),
        ..Default::default()
    })
}

/// Timestamps come as RFC 3339 strings or milliseconds
fn timestamp(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(text) => parse_rfc3339(text),
        Value::Number(n) => n.as_i64().and_then(from_millis),
        _ => None,
    }
}

fn parse_article(data: &Value, url: &str, base_url: &str, slug: String) -> Result<NewArticle> {
    let article = json::at(data, "/props/pageProps/article", url)?;
    let body = json::str_at(article, "/body", url)?;

    Ok(NewArticle {
        title: json::str_at(article, "/title", url)?,
        description: json::opt_str(article, "/description"),
        created: timestamp(article.pointer("/metaData/createdAt")),
        last_updated: timestamp(article.pointer("/metaData/updatedAt")),
        slug: Some(slug).filter(|s| !s.is_empty()),
        previous_url: url.to_string(),
        content: normalize_body(&body, base_url, url)?,
        ..Default::default()
    })
}

fn normalize_body(body: &str, base_url: &str, url: &str) -> Result<String> {
    let rules = LexicalRules { base_url, url };
    let nodes = normalize::normalize(&rules, parse_fragment(body))?;
    let nodes = normalize::remove_empty_paragraphs(nodes);
    Ok(normalize::render(&normalize::trim_whitespace(nodes), url)?)
}

/// Text of a code block, line breaks kept
fn code_text(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) if el.name == "br" => out.push('\n'),
            Node::Element(el) => code_text(&el.children, out),
        }
    }
}

struct LexicalRules<'a> {
    base_url: &'a str,
    url: &'a str,
}

impl LexicalRules<'_> {
    fn code_block(&self, pre: &Element) -> Action {
        let mut text = String::new();
        code_text(&pre.children, &mut text);

        let mut code = Element::new("code").with_text(text);
        match pre.attr("data-highlight-language") {
            Some(language) if !language.trim().is_empty() => {
                code.set_classes(&["hljs".to_string(), format!("language-{}", language.trim())]);
            }
            _ => code.set_classes(&["hljs"]),
        }
        Action::Replace(vec![Element::new("pre")
            .with_class("hljs")
            .with_children(vec![code.into()])
            .into()])
    }
}

impl Rules for LexicalRules<'_> {
    fn element(&self, mut el: Element, ancestors: &[String]) -> std::result::Result<Action, ParseError> {
        if el.name == "pre" {
            return Ok(self.code_block(&el));
        }

        let underline = el.remove_class("PlaygroundEditorTheme__textUnderline");
        let strike = el.remove_class("PlaygroundEditorTheme__textStrikethrough");
        let unknown = el.remove_classes(THEME_CLASSES);
        if !unknown.is_empty() {
            return Err(ParseError::unknown(self.url, el.describe()));
        }
        el.remove_attr("class");
        strip_to_dialect(&mut el);

        if underline || strike {
            el.name = if underline { "u" } else { "s" }.into();
            el.attrs.clear();
            return Ok(Action::Keep(el));
        }

        let parent = ancestors.last().map(String::as_str);
        match el.name.as_str() {
            "span" => Ok(Action::Unwrap(el.children)),
            "b" | "strong" if parent == Some("strong") => Ok(Action::Unwrap(el.children)),
            "i" | "em" if parent == Some("em") => Ok(Action::Unwrap(el.children)),
            "code" if parent == Some("code") => Ok(Action::Unwrap(el.children)),
            "b" => {
                el.name = "strong".into();
                Ok(Action::Keep(el))
            }
            "i" => {
                el.name = "em".into();
                Ok(Action::Keep(el))
            }
            "a" => {
                let mut a = media::clean_link(el, self.base_url, self.url, false)?;
                a.set_attr("rel", LINK_REL);
                Ok(Action::Keep(a))
            }
            "li" => {
                el.remove_attr("value");
                Ok(Action::Keep(el))
            }
            "img" => {
                for dimension in ["width", "height"] {
                    if el.attr(dimension) == Some("inherit") {
                        el.remove_attr(dimension);
                    }
                }
                Ok(Action::Replace(vec![media::figure_image(el, parent)]))
            }
            "p" if media::holds_only_images(&el) => Ok(Action::Keep(media::figure(el.children))),
            "p" if matches!(el.significant_children()[..], [node] if node.is_element("br")) => {
                Ok(Action::Drop)
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

    const BASE: &str = "https://help.acme.io/";
    const URL: &str = "https://help.acme.io/articles/getting-started-a1";

    fn content(html: &str) -> Result<String> {
        normalize_body(html, BASE, URL)
    }

    fn page(data: &Value) -> String {
        format!(r#"<html><body><script id="__NEXT_DATA__">{data}</script></body></html>"#)
    }

    #[test]
    fn test_lexical_formatting() {
        let html = content(concat!(
            r#"<p class="PlaygroundEditorTheme__paragraph" dir="ltr">"#,
            r#"<b><strong class="PlaygroundEditorTheme__textBold">Bold</strong></b> "#,
            r#"<span class="PlaygroundEditorTheme__textUnderline">under</span> "#,
            r#"<a href="/pricing" class="PlaygroundEditorTheme__link"><span>pricing</span></a></p>"#,
            r#"<p class="PlaygroundEditorTheme__paragraph"><br></p>"#,
            r#"<ul class="PlaygroundEditorTheme__ul"><li value="1" class="PlaygroundEditorTheme__listItem">one</li></ul>"#
        ))
        .unwrap();

        assert_eq!(
            html,
            concat!(
                r#"<p><strong>Bold</strong> <u>under</u> "#,
                r#"<a href="https://help.acme.io/pricing" rel="nofollow noopener noreferrer">pricing</a></p>"#,
                "<ul><li>one</li></ul>"
            )
        );
    }

    #[test]
    fn test_code_block() {
        let html = content(
            r#"<pre class="PlaygroundEditorTheme__code" data-highlight-language="js"><span>let a = 1;</span><br><span>a++;</span></pre>"#,
        )
        .unwrap();
        assert_eq!(
            html,
            "<pre class=\"hljs\"><code class=\"hljs language-js\">let a = 1;\na++;</code></pre>"
        );
    }

    #[test]
    fn test_images_become_figures() {
        let html = content(r#"<p><img src="https://cdn.acme.io/a.png" width="inherit" height="inherit"></p>"#).unwrap();
        assert_eq!(
            html,
            r#"<figure class="align--center width--normal"><img src="https://cdn.acme.io/a.png"></figure>"#
        );
    }

    #[test]
    fn test_unknown_class_fails_closed() {
        let err = content(r#"<p class="PlaygroundEditorTheme__paragraph fancy">x</p>"#).unwrap_err();
        assert!(err.to_string().contains("fancy"));
    }

    #[test]
    fn test_timestamps() {
        assert_eq!(
            timestamp(Some(&json!("2024-03-01T09:30:00.000Z"))).as_deref(),
            Some("2024-03-01T09:30:00")
        );
        assert_eq!(timestamp(Some(&json!(0))).as_deref(), Some("1970-01-01T00:00:00"));
        assert_eq!(timestamp(None), None);
    }

    #[test]
    fn test_navigation_buttons_are_rejected() {
        let portal = json!({ "siteName": "Acme", "navBar": { "buttons": [{ "label": "Sign in" }], "links": [] } });
        assert!(portal_metadata(&portal, "en", BASE).is_err());
    }

    #[tokio::test]
    async fn test_load_respects_collection_order() {
        let home = json!({ "page": "/", "props": { "pageProps": {
            "portalConfig": { "data": {
                "siteName": "Acme Help",
                "seo": { "favicon": "https://acme.io/f.ico", "description": "Docs" },
                "navBar": { "logo": "https://acme.io/l.png", "buttons": [],
                            "links": [{ "title": "Home", "url": "https://acme.io", "sort_order": 1 }] },
                "appearance": { "primaryColor": "#123456" },
                "domain": { "customDomainConfig": { "isVerified": true, "domain": "help.acme.io" } },
                "footer": { "socialLinks": [], "linkSections": [{ "title": "Terms", "url": "https://acme.io/t", "sort_order": 2 }] },
                "collections": { "collectionOrder": ["c2"] }
            }},
            "collections": [
                { "id": "c1", "label": "Getting Started", "description": "Basics" },
                { "id": "c2", "label": "Billing" }
            ]
        }}});
        let billing = json!({ "page": "/collections", "props": { "pageProps": {
            "articles": [], "collection": { "subcollections": [] }
        }}});
        let started = json!({ "page": "/collections", "props": { "pageProps": {
            "articles": [{ "id": "a1", "title": "Getting started" }],
            "collection": {}
        }}});
        let article = json!({ "page": "/articles", "props": { "pageProps": { "article": {
            "title": "Getting started",
            "body": "<p class=\"PlaygroundEditorTheme__paragraph\">Welcome</p>",
            "metaData": { "createdAt": "2024-01-02T03:04:05Z" }
        }}}});

        let site = StaticSite::new()
            .page(BASE, page(&home))
            .page("https://help.acme.io/collections/billing-c2", page(&billing))
            .page("https://help.acme.io/collections/getting-started-c1", page(&started))
            .page(URL, page(&article));
        let mut session = Session::new(&site);
        ClickConnector.load(&mut session, "https://help.acme.io", None).await.unwrap();

        let store = session.store().unwrap();
        let titles: Vec<_> = store.categories().values().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Billing", "Getting Started"]);

        let metadata = store.metadata();
        assert_eq!(metadata.custom_domain.as_deref(), Some("help.acme.io"));
        assert_eq!(metadata.code.as_deref(), Some("EN"));
        assert_eq!(metadata.links.as_ref().map(Vec::len), Some(2));

        let article = store.articles().values().next().unwrap();
        assert_eq!(article.content, "<p>Welcome</p>");
        assert_eq!(article.created.as_deref(), Some("2024-01-02T03:04:05"));
        assert_eq!(article.previous_url, URL);
    }
}
