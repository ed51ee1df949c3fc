//! OIDC discovery integration tests using wiremock
//!
//! Verifies `src/oidc/discovery.rs` against a mock provider:
//!
//! - the document is fetched from `{issuer}/.well-known/openid-configuration`
//! - non-success statuses and malformed documents become `Discovery` errors
//! - a missing `authorization_endpoint` is reported, not defaulted

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use id_token_generator::oidc::discovery::{
    discover_authorization_endpoint, fetch_discovery_document,
};
use id_token_generator::IdTokenError;

mod common;

fn is_discovery_error(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<IdTokenError>(),
        Some(IdTokenError::Discovery(_))
    )
}

#[tokio::test]
async fn test_discovers_authorization_endpoint() {
    let server = MockServer::start().await;
    let base_url = server.uri();

    Mock::given(method("GET"))
        .and(path("/.well-known/openid-configuration"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::discovery_body(&base_url)))
        .expect(1)
        .mount(&server)
        .await;

    let http = reqwest::Client::new();
    let endpoint = discover_authorization_endpoint(&http, &base_url)
        .await
        .expect("discovery must succeed");

    assert_eq!(endpoint.as_str(), format!("{}/authorize", base_url));
}

#[tokio::test]
async fn test_issuer_path_is_kept() {
    let server = MockServer::start().await;
    let issuer = format!("{}/realms/dev", server.uri());

    Mock::given(method("GET"))
        .and(path("/realms/dev/.well-known/openid-configuration"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::discovery_body(&issuer)))
        .mount(&server)
        .await;

    let http = reqwest::Client::new();
    let document = fetch_discovery_document(&http, &format!("{issuer}/"))
        .await
        .expect("discovery must succeed");

    assert_eq!(document.issuer.as_deref(), Some(issuer.as_str()));
    assert!(document.extra.contains_key("response_modes_supported"));
}

#[tokio::test]
async fn test_non_success_status_is_discovery_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/.well-known/openid-configuration"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not here"))
        .mount(&server)
        .await;

    let http = reqwest::Client::new();
    let err = discover_authorization_endpoint(&http, &server.uri())
        .await
        .unwrap_err();

    assert!(is_discovery_error(&err), "unexpected error: {err:?}");
    assert!(err.to_string().contains("404"), "status missing: {err}");
}

#[tokio::test]
async fn test_invalid_json_is_discovery_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/.well-known/openid-configuration"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(b"<html>".to_vec(), "application/json"),
        )
        .mount(&server)
        .await;

    let http = reqwest::Client::new();
    let err = fetch_discovery_document(&http, &server.uri())
        .await
        .unwrap_err();
    assert!(is_discovery_error(&err));
}

#[tokio::test]
async fn test_missing_authorization_endpoint_is_discovery_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/.well-known/openid-configuration"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "issuer": server.uri() })),
        )
        .mount(&server)
        .await;

    let http = reqwest::Client::new();
    let err = discover_authorization_endpoint(&http, &server.uri())
        .await
        .unwrap_err();
    assert!(is_discovery_error(&err));
    assert!(err.to_string().contains("authorization_endpoint"));
}

#[tokio::test]
async fn test_unreachable_issuer_is_discovery_error() {
    let port = common::free_port();
    let http = reqwest::Client::new();
    let err = discover_authorization_endpoint(&http, &format!("http://127.0.0.1:{port}"))
        .await
        .unwrap_err();
    assert!(is_discovery_error(&err));
}
