//! Tests for the CSRF token manager

use super::*;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn token_body(token: &str, expires_in_ms: u64) -> serde_json::Value {
    serde_json::json!({ "token": token, "expiresIn": expires_in_ms })
}

#[tokio::test]
async fn test_get_token_caches_until_expiry() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/csrf-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("tok-1", 600_000)))
        .expect(1)
        .mount(&server)
        .await;

    let manager = CsrfTokenManager::new(server.uri());

    assert_eq!(manager.get_token().await.unwrap(), "tok-1");
    // Second call must be served from cache, not the network.
    assert_eq!(manager.get_token().await.unwrap(), "tok-1");
    assert!(manager.has_valid_token().await);
}

#[tokio::test]
async fn test_concurrent_callers_share_one_refresh() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/csrf-token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(100))
                .set_body_json(token_body("tok-shared", 600_000)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let manager = Arc::new(CsrfTokenManager::new(server.uri()));

    let tasks: Vec<_> = (0..10)
        .map(|_| {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.get_token().await })
        })
        .collect();

    for task in tasks {
        assert_eq!(task.await.unwrap().unwrap(), "tok-shared");
    }
}

#[tokio::test]
async fn test_expired_token_triggers_refresh() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/csrf-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("short-lived", 40)))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/csrf-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("fresh", 600_000)))
        .expect(1)
        .mount(&server)
        .await;

    let manager = CsrfTokenManager::new(server.uri());

    assert_eq!(manager.get_token().await.unwrap(), "short-lived");

    tokio::time::sleep(Duration::from_millis(80)).await;
    assert!(!manager.has_valid_token().await);

    // The expired token is never served; a refresh happens instead.
    assert_eq!(manager.get_token().await.unwrap(), "fresh");
}

#[tokio::test]
async fn test_refresh_failure_clears_cache_and_errors() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/csrf-token"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&server)
        .await;

    let manager = CsrfTokenManager::new(server.uri());

    let err = manager.get_token().await.unwrap_err();
    assert!(matches!(err, crate::error::Error::Csrf { .. }));
    assert!(!manager.has_valid_token().await);
}

#[tokio::test]
async fn test_refresh_failure_fans_out_to_all_waiters() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/csrf-token"))
        .respond_with(
            ResponseTemplate::new(503)
                .set_delay(Duration::from_millis(100))
                .set_body_string("unavailable"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let manager = Arc::new(CsrfTokenManager::new(server.uri()));

    let tasks: Vec<_> = (0..5)
        .map(|_| {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.get_token().await })
        })
        .collect();

    for task in tasks {
        assert!(task.await.unwrap().is_err());
    }
}

#[tokio::test]
async fn test_clear_token_forces_refetch() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/csrf-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("tok-1", 600_000)))
        .expect(2)
        .mount(&server)
        .await;

    let manager = CsrfTokenManager::new(server.uri());

    manager.get_token().await.unwrap();
    manager.clear_token().await;
    assert!(!manager.has_valid_token().await);
    manager.get_token().await.unwrap();
}

#[tokio::test]
async fn test_missing_token_field_is_a_hard_failure() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/csrf-token"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "expiresIn": 1000 })),
        )
        .mount(&server)
        .await;

    let manager = CsrfTokenManager::new(server.uri());

    let err = manager.get_token().await.unwrap_err();
    assert!(matches!(err, crate::error::Error::Csrf { .. }));
    assert!(!manager.has_valid_token().await);
}

#[tokio::test]
async fn test_default_ttl_applies_when_expiry_omitted() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/csrf-token"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "token": "no-ttl" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let manager = CsrfTokenManager::new(server.uri());

    assert_eq!(manager.get_token().await.unwrap(), "no-ttl");
    // Default TTL keeps the token cached; no second fetch.
    assert_eq!(manager.get_token().await.unwrap(), "no-ttl");
}

#[tokio::test]
async fn test_headers_shape() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/csrf-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("hdr-tok", 600_000)))
        .mount(&server)
        .await;

    let manager = CsrfTokenManager::new(server.uri());
    let headers = manager.headers().await.unwrap();

    assert_eq!(headers.get(CSRF_TOKEN_HEADER).unwrap(), "hdr-tok");
    assert_eq!(headers.get(REQUESTED_WITH_HEADER).unwrap(), "XMLHttpRequest");
}
