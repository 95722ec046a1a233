//! Common test utilities: mock site fixtures served by wiremock

#![allow(dead_code)]

use serde_json::Value;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Serve `body` as HTML at `route`
pub async fn mount_html(server: &MockServer, route: &str, body: impl Into<String>) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html; charset=utf-8")
                .set_body_string(body.into()),
        )
        .mount(server)
        .await;
}

/// Help Scout home page listing `categories` as `(href, title)`
pub fn helpscout_home(categories: &[(&str, &str)]) -> String {
    let links: String = categories
        .iter()
        .map(|(href, title)| format!(r#"<a class="category" href="{href}"><h3>{title}</h3></a>"#))
        .collect();
    format!(
        r#"<html><body><section id="contentArea"><div class="category-list">{links}</div></section></body></html>"#
    )
}

/// Help Scout category page listing `articles` as `(href, title)`
pub fn helpscout_category(title: &str, description: &str, articles: &[(&str, &str)]) -> String {
    let items: String = articles
        .iter()
        .map(|(href, title)| format!(r#"<li><a href="{href}">{title}</a></li>"#))
        .collect();
    format!(
        r#"<html><body><section id="main-content">
            <hgroup id="categoryHead"><h1>{title}</h1><p class="descrip">{description}</p></hgroup>
            <ul class="articleList">{items}</ul>
        </section></body></html>"#
    )
}

/// Help Scout article page
pub fn helpscout_article(title: &str, body: &str) -> String {
    format!(
        r#"<html><body><section id="main-content"><article id="fullArticle">
            <h1 class="title">{title}</h1>
            <a class="printArticle" href="javascript:window.print()">Print</a>
            {body}
        </article></section></body></html>"#
    )
}

/// Page carrying Next.js data
pub fn next_page(data: &Value) -> String {
    format!(
        r#"<html><body><div id="__next"></div><script id="__NEXT_DATA__" type="application/json">{data}</script></body></html>"#
    )
}

/// Crisp home page announcing `languages` as `(code, href)`
pub fn crisp_home(languages: &[(&str, &str)], categories: &[(&str, &str)]) -> String {
    let alternates: String = languages
        .iter()
        .map(|(code, href)| format!(r#"<link rel="alternate" hreflang="{code}" href="{href}">"#))
        .collect();
    let items: String = categories
        .iter()
        .map(|(href, title)| {
            format!(
                r#"<li><a class="csh-box-link" href="{href}"><span class="csh-category-badge">{title}</span></a></li>"#
            )
        })
        .collect();
    format!(
        r#"<html><head><title>Acme Help</title>{alternates}</head><body><div id="body">
            <section data-type="categories"><ul class="csh-home-list">{items}</ul></section>
        </div></body></html>"#
    )
}

/// Crisp category page with one untitled section of `articles`
pub fn crisp_category(articles: &[&str]) -> String {
    let items: String = articles
        .iter()
        .map(|href| format!(r#"<li><a class="csh-box-link" href="{href}">x</a></li>"#))
        .collect();
    format!(
        r#"<html><body><div id="body"><div class="csh-category"><section>
            <div class="csh-category-section"><ul class="csh-category-section-list">{items}</ul></div>
        </section></div></div></body></html>"#
    )
}

/// Crisp article page updated on `updated` (`dd/mm/YYYY`)
pub fn crisp_article(title: &str, updated: &str, body: &str) -> String {
    format!(
        r#"<html><head><meta name="description" content="About {title}"></head><body>
          <div class="csh-article-content"><article>
            <h1>{title}</h1>
            <p class="csh-article-content-updated">Updated on {updated}</p>
            <div class="csh-article-content-text">{body}</div>
          </article></div>
        </body></html>"#
    )
}
