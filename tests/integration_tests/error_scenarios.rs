//! Error scenario integration tests
//!
//! Tests the failure modes of a full export:
//! 1. Unknown services
//! 2. HTTP error responses (404, 500)
//! 3. Timeouts
//! 4. Pages that do not have the expected shape
//! 5. Unknown markup in article bodies

use kb_exporter::config::Config;
use kb_exporter::error::{Error, ErrorCategory, ExportErrorTrait};
use kb_exporter::exporter::Exporter;
use kb_exporter::utils::error::{FetchError, ParseError};
use kb_exporter::Export;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{helpscout_article, helpscout_category, helpscout_home, mount_html};

fn exporter() -> Exporter {
    let mut config = Config::default();
    config.fetcher.rate_limit = 100;
    config.fetcher.request_timeout_secs = 1;
    Exporter::new(config)
}

// ============================================================================
// Service Selection
// ============================================================================

#[tokio::test]
async fn test_unknown_service() {
    let server = MockServer::start().await;

    let err = exporter()
        .export("zendesk", &server.uri(), None)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::NotImplemented(ref name) if name == "zendesk"));
    assert_eq!(err.category(), ErrorCategory::Config);
    assert!(err.to_string().contains("not available"));

    // Nothing was fetched
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

// ============================================================================
// HTTP Error Tests
// ============================================================================

#[tokio::test]
async fn test_404_is_fatal_and_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
        .expect(1)
        .mount(&server)
        .await;

    let err = exporter()
        .export("helpscout", &format!("{}/", server.uri()), None)
        .await
        .unwrap_err();

    match err {
        Error::Fetch(FetchError::Status { status, ref url }) => {
            assert_eq!(status, 404);
            assert!(url.starts_with(&server.uri()));
        }
        other => panic!("Expected status error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_server_error_mid_crawl() {
    let server = MockServer::start().await;

    mount_html(&server, "/", helpscout_home(&[("/category/1-billing", "Billing")])).await;
    Mock::given(method("GET"))
        .and(path("/category/1-billing"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let err = exporter()
        .export("helpscout", &format!("{}/", server.uri()), None)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Fetch(FetchError::Status { status: 500, .. })
    ));
    assert_eq!(err.category(), ErrorCategory::Network);
    assert!(!err.is_recoverable());
}

#[tokio::test]
async fn test_timeout_handling() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html></html>")
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let err = exporter()
        .export("helpscout", &format!("{}/", server.uri()), None)
        .await
        .unwrap_err();

    assert!(
        matches!(err, Error::Fetch(FetchError::Timeout(_))),
        "Expected timeout error, got: {err:?}"
    );
    assert!(err.is_recoverable());
}

// ============================================================================
// Source Shape Tests
// ============================================================================

#[tokio::test]
async fn test_missing_element_names_selector_and_page() {
    let server = MockServer::start().await;

    mount_html(&server, "/", helpscout_home(&[("/category/1-billing", "Billing")])).await;
    mount_html(&server, "/category/1-billing", "<html><body>Maintenance</body></html>").await;

    let err = exporter()
        .export("helpscout", &format!("{}/", server.uri()), None)
        .await
        .unwrap_err();

    match &err {
        Error::Parse(ParseError::MissingElement { selector, url }) => {
            assert_eq!(selector, "section#main-content");
            assert!(url.ends_with("/category/1-billing"));
        }
        other => panic!("Expected missing element, got: {other:?}"),
    }
    assert_eq!(err.category(), ErrorCategory::Parsing);
}

#[tokio::test]
async fn test_unknown_markup_fails_closed() {
    let server = MockServer::start().await;

    mount_html(&server, "/", helpscout_home(&[("/category/1-billing", "Billing")])).await;
    mount_html(
        &server,
        "/category/1-billing",
        helpscout_category("Billing", "", &[("/article/10-refunds", "Refunds")]),
    )
    .await;
    mount_html(
        &server,
        "/article/10-refunds",
        helpscout_article("Refunds", "<p>Hello</p><marquee>Sale!</marquee>"),
    )
    .await;

    let err = exporter()
        .export("helpscout", &format!("{}/", server.uri()), None)
        .await
        .unwrap_err();

    let message = err.to_string();
    assert!(matches!(err, Error::Parse(ParseError::UnknownNode { .. })));
    assert!(message.contains("marquee"));
    assert!(message.contains("/article/10-refunds"));
}

#[tokio::test]
async fn test_invalid_next_data_fails() {
    let server = MockServer::start().await;

    mount_html(
        &server,
        "/",
        r#"<html><body><script id="__NEXT_DATA__" type="application/json">{not json</script></body></html>"#,
    )
    .await;

    let err = exporter()
        .export("next", &format!("{}/", server.uri()), None)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Parse(ParseError::InvalidJson { .. })));
}

// ============================================================================
// Output Tests
// ============================================================================

#[test]
fn test_failed_write_leaves_no_file() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("missing").join("export.json");

    let mut export = Export::new();
    export.add_language("en", "https://x.io/").unwrap();

    let err = export.write_to(&output, true).unwrap_err();
    assert!(matches!(err, Error::Io(_)));
    assert!(!output.exists());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}
