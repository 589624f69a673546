//! Concurrency property tests exercising the full ingestion router (spec
//! §8's scenarios 1 and 2, as properties P1 and P3), without any live
//! external service.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, header};
use flashgate::config::AppConfig;
use flashgate::counter_store::InMemoryCounterStore;
use flashgate::durable_log::InMemoryReservationProducer;
use flashgate::ingestion::routes::build_router;
use flashgate::ingestion::state::AppState;
use serde_json::json;
use tower::ServiceExt;

fn test_config() -> AppConfig {
    AppConfig {
        counter_store_url: String::new(),
        log_broker_addrs: String::new(),
        database_url: "postgres://unused/unused".to_string(),
        admission_cap_per_sec: 1_000_000,
        waiting_room_url: "https://example.invalid/wait".to_string(),
        orders_topic: "orders".to_string(),
        consumer_group_id: "inventory-group".to_string(),
        idempotency_ttl: Duration::from_secs(60),
        rate_bucket_ttl: Duration::from_secs(2),
        ingestion_bind_addr: "0.0.0.0:0".to_string(),
        bootstrap_product_id: "iphone-15".to_string(),
        bootstrap_product_stock: 100,
        log_level: "info".to_string(),
        log_json: false,
    }
}

fn order_request(product_id: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/order")
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-idempotency-key", token)
        .body(Body::from(
            json!({"productId": product_id, "userId": "buyer"}).to_string(),
        ))
        .unwrap()
}

/// P1 — no oversell: for stock N and any number of concurrent `order`
/// requests, the count of `success` replies never exceeds N.
#[tokio::test]
async fn p1_no_oversell_under_800_concurrent_distinct_tokens() {
    let counter_store = Arc::new(InMemoryCounterStore::new());
    counter_store.init_stock("widget", 250).await.unwrap();
    let state = AppState::new(
        counter_store,
        Arc::new(InMemoryReservationProducer::new()),
        Arc::new(test_config()),
    );
    let app = build_router(state);

    let mut handles = Vec::new();
    for i in 0..800 {
        let app = app.clone();
        let token = format!("p1-tok-{i}");
        handles.push(tokio::spawn(async move {
            let response = app.oneshot(order_request("widget", &token)).await.unwrap();
            let body = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
            body["status"].as_str().unwrap().to_string()
        }));
    }

    let mut success = 0;
    for handle in handles {
        if handle.await.unwrap() == "success" {
            success += 1;
        }
    }

    assert_eq!(success, 250, "exactly the initial stock should be reserved");
}

/// P3 — idempotency: for any two requests sharing the same idempotency
/// token, at most one yields `success` across many concurrent contenders
/// for the *same* token.
#[tokio::test]
async fn p3_idempotency_holds_under_40_concurrent_requests_sharing_one_token() {
    let counter_store = Arc::new(InMemoryCounterStore::new());
    counter_store.init_stock("widget", 1_000).await.unwrap();
    let state = AppState::new(
        counter_store.clone(),
        Arc::new(InMemoryReservationProducer::new()),
        Arc::new(test_config()),
    );
    let app = build_router(state);

    let mut handles = Vec::new();
    for _ in 0..40 {
        let app = app.clone();
        handles.push(tokio::spawn(async move {
            let response = app
                .oneshot(order_request("widget", "one-token-to-rule-them-all"))
                .await
                .unwrap();
            let body = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
            body["status"].as_str().unwrap().to_string()
        }));
    }

    let mut success = 0;
    for handle in handles {
        if handle.await.unwrap() == "success" {
            success += 1;
        }
    }

    assert_eq!(success, 1, "exactly one contender should win the shared token");
}
