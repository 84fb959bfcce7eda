//! Integration tests for the listing fetch pipeline.
//!
//! A wiremock server plays both roles: the WebDriver endpoint (wire-protocol
//! JSON envelopes) and the document host serving PDF bytes. No real browser
//! or network is involved.

use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fiiwatch_core::{DocumentPayload, SourceKind};
use fiiwatch_fetcher::sources::FetchOptions;
use fiiwatch_fetcher::{
    fetch_new_documents, Downloader, FatosRelevantesSource, FetchError, OfertasPublicasSource,
    WebDriverClient,
};

const SESSION_ID: &str = "feedbead-0001";

fn options() -> FetchOptions {
    FetchOptions {
        since: None,
        max_pages: 3,
        max_retries: 0,
        backoff_base_ms: 0,
        download_concurrency: 2,
    }
}

/// Mounts the WebDriver session lifecycle mocks common to every test.
async fn mount_session_scaffolding(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/session"))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            json!({"value": {"sessionId": SESSION_ID, "capabilities": {}}}),
        ))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path(format!("/session/{SESSION_ID}/url")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": null})))
        .mount(server)
        .await;

    Mock::given(method("DELETE"))
        .and(path(format!("/session/{SESSION_ID}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": null})))
        .mount(server)
        .await;
}

/// Mounts a table-presence check returning one element id.
async fn mount_table_present(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(format!("/session/{SESSION_ID}/elements")))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            json!({"value": [{"element-6066-11e4-a52e-4f735466cecf": "el-1"}]}),
        ))
        .mount(server)
        .await;
}

#[tokio::test]
async fn fetches_listed_documents_and_fingerprints_them() {
    let server = MockServer::start().await;
    mount_session_scaffolding(&server).await;
    mount_table_present(&server).await;

    // Row extraction script returns one filing pointing back at this server.
    Mock::given(method("POST"))
        .and(path(format!("/session/{SESSION_ID}/execute/sync")))
        .and(body_string_contains("tbody tr"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": [
            {"url": format!("{}/docs/1.pdf", server.uri()), "code": "ABCD11", "date": "10/05/2024"}
        ]})))
        .mount(&server)
        .await;

    // Pagination script reports a single page.
    Mock::given(method("POST"))
        .and(path(format!("/session/{SESSION_ID}/execute/sync")))
        .and(body_string_contains("_next"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": false})))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/docs/1.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.7 fato".to_vec()))
        .mount(&server)
        .await;

    let driver = WebDriverClient::new(&server.uri(), 5).unwrap();
    let downloader = Downloader::new(5, "fiiwatch-test/0.1", 0, 0).unwrap();
    let source = FatosRelevantesSource::new(format!("{}/listing", server.uri()));

    let docs = fetch_new_documents(
        &driver,
        &downloader,
        &source,
        &std::collections::HashSet::new(),
        options(),
    )
    .await
    .unwrap();

    assert_eq!(docs.len(), 1);
    let doc = &docs[0];
    assert_eq!(doc.source, SourceKind::FatoRelevante);
    assert_eq!(doc.listed_code, "ABCD11");
    match &doc.payload {
        DocumentPayload::Fetched { bytes, fingerprint } => {
            assert_eq!(bytes, b"%PDF-1.7 fato");
            assert_eq!(fingerprint.len(), 64, "expected hex sha256");
        }
        DocumentPayload::Failed { reason } => panic!("unexpected failure: {reason}"),
    }
}

#[tokio::test]
async fn download_failure_is_isolated_to_its_document() {
    let server = MockServer::start().await;
    mount_session_scaffolding(&server).await;
    mount_table_present(&server).await;

    Mock::given(method("POST"))
        .and(path(format!("/session/{SESSION_ID}/execute/sync")))
        .and(body_string_contains("tbody tr"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": [
            {"url": format!("{}/docs/ok.pdf", server.uri()), "code": "ABCD11", "date": ""},
            {"url": format!("{}/docs/gone.pdf", server.uri()), "code": "WXYZ11", "date": ""}
        ]})))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(format!("/session/{SESSION_ID}/execute/sync")))
        .and(body_string_contains("_next"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": false})))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/docs/ok.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF ok".to_vec()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/docs/gone.pdf"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let driver = WebDriverClient::new(&server.uri(), 5).unwrap();
    let downloader = Downloader::new(5, "fiiwatch-test/0.1", 0, 0).unwrap();
    let source = FatosRelevantesSource::new(format!("{}/listing", server.uri()));

    let docs = fetch_new_documents(
        &driver,
        &downloader,
        &source,
        &std::collections::HashSet::new(),
        options(),
    )
    .await
    .unwrap();

    assert_eq!(docs.len(), 2);
    let fetched = docs
        .iter()
        .filter(|d| matches!(d.payload, DocumentPayload::Fetched { .. }))
        .count();
    let failed = docs
        .iter()
        .filter(|d| matches!(d.payload, DocumentPayload::Failed { .. }))
        .count();
    assert_eq!((fetched, failed), (1, 1));
}

#[tokio::test]
async fn already_seen_fingerprints_are_not_yielded_again() {
    let server = MockServer::start().await;
    mount_session_scaffolding(&server).await;
    mount_table_present(&server).await;

    Mock::given(method("POST"))
        .and(path(format!("/session/{SESSION_ID}/execute/sync")))
        .and(body_string_contains("tbody tr"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": [
            {"url": format!("{}/docs/1.pdf", server.uri()), "code": "ABCD11", "date": ""}
        ]})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/session/{SESSION_ID}/execute/sync")))
        .and(body_string_contains("_next"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": false})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/docs/1.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.7 fato".to_vec()))
        .mount(&server)
        .await;

    let driver = WebDriverClient::new(&server.uri(), 5).unwrap();
    let downloader = Downloader::new(5, "fiiwatch-test/0.1", 0, 0).unwrap();
    let source = FatosRelevantesSource::new(format!("{}/listing", server.uri()));

    let seen: std::collections::HashSet<String> =
        [fiiwatch_core::fingerprint_bytes(b"%PDF-1.7 fato")].into();

    let docs = fetch_new_documents(&driver, &downloader, &source, &seen, options())
        .await
        .unwrap();
    assert!(docs.is_empty(), "seen document must not be yielded again");
}

#[tokio::test]
async fn ofertas_feed_scrolls_until_card_count_settles() {
    let server = MockServer::start().await;
    mount_session_scaffolding(&server).await;
    mount_table_present(&server).await;

    // Scroll probe reports a settled card count immediately.
    Mock::given(method("POST"))
        .and(path(format!("/session/{SESSION_ID}/execute/sync")))
        .and(body_string_contains("scrollTo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": 1})))
        .mount(&server)
        .await;

    // Card extraction runs once after scrolling settles.
    Mock::given(method("POST"))
        .and(path(format!("/session/{SESSION_ID}/execute/sync")))
        .and(body_string_contains("innerText"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": [
            {"url": format!("{}/docs/oferta.pdf", server.uri()), "code": "WXYZ11", "date": "2024-06-01"}
        ]})))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/docs/oferta.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF oferta".to_vec()))
        .mount(&server)
        .await;

    let driver = WebDriverClient::new(&server.uri(), 5).unwrap();
    let downloader = Downloader::new(5, "fiiwatch-test/0.1", 0, 0).unwrap();
    let source = OfertasPublicasSource::new(format!("{}/ofertas", server.uri()));

    let docs = fetch_new_documents(
        &driver,
        &downloader,
        &source,
        &std::collections::HashSet::new(),
        options(),
    )
    .await
    .unwrap();

    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].source, SourceKind::OfertaPublica);
    assert_eq!(docs[0].listed_code, "WXYZ11");
}

#[tokio::test]
async fn missing_table_is_layout_drift() {
    let server = MockServer::start().await;
    mount_session_scaffolding(&server).await;

    // Element lookup finds nothing: the page structure changed.
    Mock::given(method("POST"))
        .and(path(format!("/session/{SESSION_ID}/elements")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": []})))
        .mount(&server)
        .await;

    let driver = WebDriverClient::new(&server.uri(), 5).unwrap();
    let downloader = Downloader::new(5, "fiiwatch-test/0.1", 0, 0).unwrap();
    let source = FatosRelevantesSource::new(format!("{}/listing", server.uri()));

    let result = fetch_new_documents(
        &driver,
        &downloader,
        &source,
        &std::collections::HashSet::new(),
        options(),
    )
    .await;

    assert!(
        matches!(result, Err(FetchError::ListingDrift { .. })),
        "expected ListingDrift, got: {result:?}"
    );
}
