//! Integration tests using a mock HTTP server
//!
//! Exercises the full flow: typed API → resilient client → CSRF manager
//! and rate limiter → mock backend.

use ledgerline_client::api::{BudgetPeriod, NewBudget};
use ledgerline_client::http::{RateLimitConfig, RateLimiter, BUDGET_MODIFICATION};
use ledgerline_client::{ApiClient, ApiConfig, BudgetApi, Error};
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_csrf(server: &MockServer, token: &str) {
    Mock::given(method("GET"))
        .and(path("/csrf-token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "token": token, "expiresIn": 600_000 })),
        )
        .mount(server)
        .await;
}

fn config_for(server: &MockServer) -> ApiConfig {
    ApiConfig::new(server.uri()).with_retry_delay(Duration::from_millis(10))
}

// ============================================================================
// End-to-end request flow
// ============================================================================

#[tokio::test]
async fn test_full_mutating_flow_attaches_token_and_parses_payload() {
    let server = MockServer::start().await;
    mount_csrf(&server, "e2e-tok").await;

    Mock::given(method("POST"))
        .and(path("/budgets"))
        .and(header("X-CSRF-Token", "e2e-tok"))
        .and(header("X-Requested-With", "XMLHttpRequest"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 42,
            "name": "Savings",
            "amount": 300.0,
            "spent": 0.0,
            "period": "monthly"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let api = BudgetApi::new(config_for(&server)).unwrap();
    let created = api
        .create_budget(&NewBudget {
            name: "Savings".to_string(),
            amount: 300.0,
            category: None,
            period: BudgetPeriod::Monthly,
        })
        .await
        .unwrap();

    assert_eq!(created.id, 42);
    assert!(api.client().has_valid_csrf_token().await);
}

#[tokio::test]
async fn test_token_is_fetched_once_across_many_mutations() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/csrf-token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "token": "once", "expiresIn": 600_000 })),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/budgets"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 1, "name": "x", "amount": 1.0, "spent": 0.0, "period": "monthly"
        })))
        .expect(5)
        .mount(&server)
        .await;

    let api = BudgetApi::new(config_for(&server)).unwrap();
    for _ in 0..5 {
        api.create_budget(&NewBudget {
            name: "x".to_string(),
            amount: 1.0,
            category: None,
            period: BudgetPeriod::Monthly,
        })
        .await
        .unwrap();
    }
}

#[tokio::test]
async fn test_transient_failure_recovers_within_retry_budget() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/budgets/overview"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/budgets/overview"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "totalBudgeted": 100.0,
            "totalSpent": 40.0,
            "totalRemaining": 60.0,
            "budgets": []
        })))
        .expect(1)
        .mount(&server)
        .await;

    let api = BudgetApi::new(config_for(&server)).unwrap();
    let overview = api.overview().await.unwrap();

    assert_eq!(overview.total_remaining, 60.0);
}

#[tokio::test]
async fn test_admission_denial_reaches_the_typed_surface() {
    let server = MockServer::start().await;
    mount_csrf(&server, "tok").await;

    Mock::given(method("POST"))
        .and(path("/budgets"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 1, "name": "x", "amount": 1.0, "spent": 0.0, "period": "monthly"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let limiter = RateLimiter::with_config(HashMap::from([(
        BUDGET_MODIFICATION.to_string(),
        RateLimitConfig::new(1, Duration::from_millis(60_000)),
    )]));
    let client = ApiClient::new(config_for(&server))
        .unwrap()
        .with_rate_limiter(limiter);
    let api = BudgetApi::from_client(client);

    let budget = NewBudget {
        name: "x".to_string(),
        amount: 1.0,
        category: None,
        period: BudgetPeriod::Monthly,
    };

    api.create_budget(&budget).await.unwrap();
    let err = api.create_budget(&budget).await.unwrap_err();

    assert!(matches!(err, Error::RateLimited { .. }));
}
