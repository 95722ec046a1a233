//! Full export runs against mock sites

use kb_exporter::config::Config;
use kb_exporter::exporter::Exporter;
use serde_json::{json, Value};
use wiremock::MockServer;

use crate::common::{
    crisp_article, crisp_category, crisp_home, helpscout_article, helpscout_category,
    helpscout_home, mount_html, next_page,
};

fn exporter() -> Exporter {
    let mut config = Config::default();
    config.fetcher.rate_limit = 100;
    Exporter::new(config)
}

// ============================================================================
// Help Scout
// ============================================================================

async fn helpscout_site() -> MockServer {
    let server = MockServer::start().await;

    mount_html(
        &server,
        "/",
        helpscout_home(&[("/category/1-billing", "Billing"), ("/category/2-account", "Account")]),
    )
    .await;
    mount_html(
        &server,
        "/category/1-billing",
        helpscout_category(
            "Billing",
            "Invoices and refunds",
            &[("/article/10-refunds", "Refunds"), ("/article/11-invoices", "Invoices")],
        ),
    )
    .await;
    mount_html(
        &server,
        "/category/2-account",
        helpscout_category("Account", "Your profile", &[("/article/10-refunds", "Refunds")]),
    )
    .await;
    mount_html(
        &server,
        "/article/10-refunds",
        helpscout_article("Refunds", "<p>Refunds take <b>5 days</b>.</p>"),
    )
    .await;
    mount_html(
        &server,
        "/article/11-invoices",
        helpscout_article(
            "Invoices",
            r#"<p>See <a href="/article/10-refunds">refunds</a>.</p><p><img src="/invoice.png" alt=""></p>"#,
        ),
    )
    .await;

    server
}

#[tokio::test]
async fn test_helpscout_export() {
    let server = helpscout_site().await;
    let base = format!("{}/", server.uri());

    let export = exporter().export("Help_Scout", &base, None).await.unwrap();
    assert_eq!(export.languages().collect::<Vec<_>>(), vec!["en"]);

    let store = export.get("en").unwrap();
    let categories: Vec<_> = store.categories().values().collect();
    assert_eq!(categories.len(), 2);
    assert_eq!(categories[0].title, "Billing");
    assert_eq!(categories[0].description.as_deref(), Some("Invoices and refunds"));
    assert_eq!(categories[0].articles.len(), 2);

    // shared article fetched once, filed twice
    assert_eq!(store.articles().len(), 2);
    assert_eq!(categories[1].articles, vec![categories[0].articles[0].clone()]);

    let refunds = store.article(&categories[0].articles[0]).unwrap();
    assert_eq!(refunds.title, "Refunds");
    assert_eq!(refunds.content, "<p>Refunds take <strong>5 days</strong>.</p>");
    assert_eq!(refunds.previous_url, format!("{}/article/10-refunds", server.uri()));

    let invoices = store.article(&categories[0].articles[1]).unwrap();
    assert!(invoices.content.contains(&format!(
        r#"<a href="{}/article/10-refunds" rel="noopener noreferrer">refunds</a>"#,
        server.uri()
    )));
    assert!(invoices
        .content
        .contains(r#"<figure class="align--center width--normal"><img src="/invoice.png"></figure>"#));
}

#[tokio::test]
async fn test_export_document_shape() {
    let server = helpscout_site().await;
    let base = format!("{}/", server.uri());

    let export = exporter().export("helpscout", &base, None).await.unwrap();
    let document: Value = serde_json::from_str(&export.to_json(true).unwrap()).unwrap();

    let en = &document["en"];
    assert_eq!(en["language"], "en");
    assert_eq!(en["base_url"], base.as_str());

    let categories = en["categories"].as_object().unwrap();
    let articles = en["articles"].as_object().unwrap();
    for category in categories.values() {
        assert!(category["parent"].is_null());
        for id in category["articles"].as_array().unwrap() {
            assert!(articles.contains_key(id.as_str().unwrap()));
        }
    }

    let slugs: Vec<_> = articles.values().map(|a| a["slug"].as_str().unwrap()).collect();
    assert_eq!(slugs, vec!["refunds", "invoices"]);
}

#[tokio::test]
async fn test_output_file_is_written() {
    let server = helpscout_site().await;
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("export.json");

    let export = exporter()
        .export("helpscout", &format!("{}/", server.uri()), None)
        .await
        .unwrap();
    export.write_to(&output, false).unwrap();

    let written: Value = serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(written["en"]["articles"].as_object().unwrap().len(), 2);
    assert!(!dir.path().join("export.json.partial").exists());
}

// ============================================================================
// Next.js (Intercom)
// ============================================================================

#[tokio::test]
async fn test_intercom_export() {
    let server = MockServer::start().await;
    let uri = server.uri();

    let home = json!({ "page": "/", "props": { "pageProps": {
        "app": { "name": "Acme" },
        "theme": { "siteName": "Acme Help", "favicon": format!("{uri}/favicon.ico"),
                   "logo": format!("{uri}/logo.png"), "color": "0057ff", "locale": "en" },
        "helpCenterSite": {
            "footerLinks": { "custom": [{ "title": "Blog", "url": "https://acme.io/blog", "sort_order": 2 }] },
            "headerLinks": []
        },
        "home": { "collections": [
            { "name": "Getting started", "slug": "getting-started", "description": "Basics",
              "url": format!("{uri}/en/collections/1-getting-started") }
        ]}
    }}});
    let collection = json!({ "page": "/collection", "props": { "pageProps": { "collection": {
        "articleSummaries": [{ "url": format!("{uri}/en/articles/7-install") }]
    }}}});
    let article = json!({ "page": "/article", "props": { "pageProps": { "articleContent": {
        "title": "Install", "description": "First steps",
        "blocks": [
            { "type": "paragraph", "text": "Run the <b>installer</b>" },
            { "type": "code", "text": "  ./install.sh\n" }
        ]
    }}}});

    mount_html(&server, "/en/", next_page(&home)).await;
    mount_html(&server, "/en/collections/1-getting-started", next_page(&collection)).await;
    mount_html(&server, "/en/articles/7-install", next_page(&article)).await;

    let export = exporter()
        .export("intercom", &format!("{uri}/en"), Some("EN"))
        .await
        .unwrap();
    let store = export.get("en").unwrap();

    assert_eq!(store.metadata().title.as_deref(), Some("Acme Help"));
    assert_eq!(store.metadata().accent_color.as_deref(), Some("#0057ff"));
    let links = store.metadata().links.clone().unwrap();
    assert_eq!(links[0].title, "Blog");
    assert_eq!(links[0].sort, 2);

    let category = store.categories().values().next().unwrap();
    assert_eq!(category.slug, "getting-started");

    let install = store.articles().values().next().unwrap();
    assert_eq!(install.slug, "install");
    assert_eq!(
        install.content,
        "<p>Run the <strong>installer</strong></p><pre><code>./install.sh</code></pre>"
    );
}

// ============================================================================
// Crisp
// ============================================================================

async fn crisp_site() -> MockServer {
    let server = MockServer::start().await;
    let uri = server.uri();
    let languages = [("en", format!("{uri}/en/")), ("fr", format!("{uri}/fr/"))];
    let languages: Vec<(&str, &str)> = languages.iter().map(|(c, h)| (*c, h.as_str())).collect();

    mount_html(&server, "/", crisp_home(&languages, &[])).await;
    mount_html(
        &server,
        "/en/",
        crisp_home(&languages, &[("/en/category/billing-1a/", "Billing")]),
    )
    .await;
    mount_html(
        &server,
        "/fr/",
        crisp_home(&languages, &[("/fr/category/facturation-1a/", "Facturation")]),
    )
    .await;
    mount_html(&server, "/en/category/billing-1a/", crisp_category(&["/en/article/refunds-9z/"])).await;
    mount_html(
        &server,
        "/fr/category/facturation-1a/",
        crisp_category(&["/fr/article/remboursements-9z/"]),
    )
    .await;
    mount_html(
        &server,
        "/en/article/refunds-9z/",
        crisp_article(
            "Refunds",
            "21/03/2024",
            r#"<p>Refunds take <span class="csh-markdown csh-markdown-bold">5 days</span>.</p>"#,
        ),
    )
    .await;
    mount_html(
        &server,
        "/fr/article/remboursements-9z/",
        crisp_article("Remboursements", "02/01/2024", "<p>Cinq jours.</p>"),
    )
    .await;

    server
}

#[tokio::test]
async fn test_crisp_exports_every_language() {
    let server = crisp_site().await;

    let export = exporter()
        .export("crisp", &format!("{}/en/", server.uri()), None)
        .await
        .unwrap();
    assert_eq!(export.languages().collect::<Vec<_>>(), vec!["en", "fr"]);

    let en = export.get("en").unwrap();
    let refunds = en.articles().values().next().unwrap();
    assert_eq!(refunds.content, "<p>Refunds take <strong>5 days</strong>.</p>");
    assert_eq!(refunds.last_updated.as_deref(), Some("2024-03-21T00:00:00"));
    assert_eq!(refunds.description.as_deref(), Some("About Refunds"));

    let fr = export.get("fr").unwrap();
    assert_eq!(fr.base_url(), format!("{}/fr/", server.uri()));
    assert_eq!(fr.categories().values().next().unwrap().title, "Facturation");
}

#[tokio::test]
async fn test_crisp_language_filter() {
    let server = crisp_site().await;

    let export = exporter()
        .export("crisp", &format!("{}/", server.uri()), Some("FR"))
        .await
        .unwrap();
    assert_eq!(export.languages().collect::<Vec<_>>(), vec!["fr"]);
}
