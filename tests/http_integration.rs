//! Integration tests for the two HTTP-fetching components against a mock
//! server, exercising the real `reqwest` client path instead of stubbing it.

use govsi_crawler::fetch::{FetchBackend, FetchBody, ReqwestFetchBackend};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn fetch_backend_classifies_html_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body>hi</body></html>"))
        .mount(&server)
        .await;

    let backend = ReqwestFetchBackend::new(reqwest::Client::new());
    let outcome = backend
        .fetch(&format!("{}/page", server.uri()))
        .await
        .unwrap();

    assert_eq!(outcome.status, 200);
    match outcome.body {
        FetchBody::Html(html) => assert!(html.contains("hi")),
        FetchBody::Binary(_) => panic!("expected an HTML body"),
    }
}

#[tokio::test]
async fn fetch_backend_classifies_pdf_response_as_binary() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/doc.pdf"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/pdf")
                .set_body_bytes(b"%PDF-1.4 fake pdf body".to_vec()),
        )
        .mount(&server)
        .await;

    let backend = ReqwestFetchBackend::new(reqwest::Client::new());
    let outcome = backend
        .fetch(&format!("{}/doc.pdf", server.uri()))
        .await
        .unwrap();

    assert!(matches!(outcome.body, FetchBody::Binary(_)));
    assert_eq!(outcome.content_type.as_deref(), Some("application/pdf"));
}

#[tokio::test]
async fn fetch_backend_reports_final_url_after_redirect() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/new"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .mount(&server)
        .await;

    let backend = ReqwestFetchBackend::new(reqwest::Client::new());
    let outcome = backend
        .fetch(&format!("{}/old", server.uri()))
        .await
        .unwrap();

    assert_eq!(outcome.status, 200);
    assert!(outcome.final_url.ends_with("/new"));
}
