use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::{Json, Router};

use crate::errors::ApiResponse;
use crate::models::ReservationEvent;

use super::state::AppState;
use super::types::{ErrorResponse, InitRequest, OrderRequest, OrderResponseData};

const MAX_ID_LEN: usize = 256;
const IDEMPOTENCY_HEADER: &str = "x-idempotency-key";

/// The outcome of the hot path, named the way the spec names it (spec
/// §4.1), so the HTTP mapping at the bottom of this module is the only
/// place that knows about status codes.
enum Outcome {
    Accepted { reservation_id: String },
    Duplicate,
    SoldOut,
    Throttled { waiting_room_url: String },
    BadRequest(String),
    Internal(String),
}

impl IntoResponse for Outcome {
    fn into_response(self) -> Response {
        match self {
            Outcome::Accepted { reservation_id } => (
                StatusCode::OK,
                Json(OrderResponseData {
                    status: "success",
                    msg: "Order accepted".to_string(),
                    reservation_id: Some(reservation_id),
                }),
            )
                .into_response(),
            Outcome::Duplicate => (
                StatusCode::OK,
                Json(OrderResponseData {
                    status: "ignored",
                    msg: "Duplicate request".to_string(),
                    reservation_id: None,
                }),
            )
                .into_response(),
            Outcome::SoldOut => (
                StatusCode::CONFLICT,
                Json(OrderResponseData {
                    status: "sold_out",
                    msg: "Inventory empty".to_string(),
                    reservation_id: None,
                }),
            )
                .into_response(),
            Outcome::Throttled { waiting_room_url } => {
                Redirect::to(&waiting_room_url).into_response()
            }
            Outcome::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse { error: msg })).into_response()
            }
            Outcome::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::new("error", msg)),
            )
                .into_response(),
        }
    }
}

fn valid_id(id: &str) -> bool {
    !id.is_empty() && id.len() <= MAX_ID_LEN && id.chars().all(|c| c.is_ascii_graphic())
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before the Unix epoch")
        .as_millis() as i64
}

/// `POST /init` — administrative, not on the hot path (spec §4.1).
#[utoipa::path(
    post,
    path = "/init",
    request_body = InitRequest,
    responses(
        (status = 200, description = "Stock initialized"),
        (status = 500, description = "Counter store unreachable"),
    ),
    tag = "admin"
)]
pub async fn init(
    State(state): State<AppState>,
    Json(req): Json<InitRequest>,
) -> impl IntoResponse {
    match state.counter_store.init_stock(&req.product_id, req.quantity).await {
        Ok(()) => (StatusCode::OK, Json(ApiResponse::new("ok", "stock initialized"))),
        Err(err) => {
            tracing::error!(error = %err, product_id = %req.product_id, "init_stock failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::new("error", err.to_string())),
            )
        }
    }
}

/// `POST /order` — the seven-step hot path of spec §4.1.
#[utoipa::path(
    post,
    path = "/order",
    request_body = OrderRequest,
    responses(
        (status = 200, description = "success | ignored", body = OrderResponseData),
        (status = 302, description = "throttled, redirected to waiting room"),
        (status = 400, description = "bad_request", body = ErrorResponse),
        (status = 409, description = "sold_out", body = OrderResponseData),
        (status = 500, description = "internal_error"),
    ),
    tag = "order"
)]
pub async fn order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<OrderRequest>,
) -> impl IntoResponse {
    handle_order(state, headers, req).await
}

async fn handle_order(state: AppState, headers: HeaderMap, req: OrderRequest) -> Outcome {
    let now_secs = now_ms() / 1_000;
    let bucket_key = now_secs.to_string();

    // 1. Admission / rate shaping.
    match state
        .counter_store
        .admit(
            &bucket_key,
            state.config.admission_cap_per_sec,
            state.config.rate_bucket_ttl,
        )
        .await
    {
        Ok(true) => {}
        Ok(false) => {
            return Outcome::Throttled {
                waiting_room_url: state.config.waiting_room_url.clone(),
            };
        }
        Err(err) => {
            // Admission cannot be proven: fail-closed (spec §4.1 failure
            // semantics).
            tracing::error!(error = %err, "admission check failed");
            return Outcome::Internal(err.to_string());
        }
    }

    // 2. Input validation.
    let token = match headers
        .get(IDEMPOTENCY_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
    {
        Some(token) => token.to_string(),
        None => return Outcome::BadRequest("missing x-idempotency-key header".to_string()),
    };
    if !valid_id(&req.product_id) || !valid_id(&req.user_id) {
        return Outcome::BadRequest("productId/userId missing or out of bounds".to_string());
    }

    // 3. Idempotency lookup.
    match state.counter_store.idempotency_check(&token).await {
        Ok(true) => return Outcome::Duplicate,
        Ok(false) => {}
        Err(err) => {
            tracing::error!(error = %err, "idempotency lookup failed");
            return Outcome::Internal(err.to_string());
        }
    }

    // 4. Atomic reservation.
    match state.counter_store.try_reserve(&req.product_id).await {
        Ok(true) => {}
        Ok(false) => return Outcome::SoldOut,
        Err(err) => {
            tracing::error!(error = %err, "atomic reservation failed");
            return Outcome::Internal(err.to_string());
        }
    }

    // 5. Durable handoff. Stock is already decremented: a failure here is
    // the documented partial-failure window (spec §4.1), not compensated.
    let event = ReservationEvent::new(req.product_id.clone(), req.user_id.clone(), now_ms());
    if let Err(err) = state.producer.produce(&event).await {
        tracing::error!(
            error = %err,
            product_id = %req.product_id,
            user_id = %req.user_id,
            "durable log produce failed after stock was already reserved; accepting possible under-sell",
        );
        return Outcome::Internal(err.to_string());
    }

    // 6. Idempotency marking — only after the durable write succeeds.
    if let Err(err) = state
        .counter_store
        .idempotency_mark(&token, state.config.idempotency_ttl)
        .await
    {
        tracing::error!(error = %err, "idempotency marking failed after successful produce");
        return Outcome::Internal(err.to_string());
    }

    // 7. Reply.
    Outcome::Accepted {
        reservation_id: event.reservation_id.to_string(),
    }
}

pub fn health_router() -> Router<AppState> {
    Router::new().route("/health", axum::routing::get(health))
}

#[utoipa::path(get, path = "/health", responses((status = 200, description = "ok")), tag = "admin")]
async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(ApiResponse::new("ok", "healthy")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::counter_store::InMemoryCounterStore;
    use crate::durable_log::InMemoryReservationProducer;
    use std::time::Duration;

    fn test_config() -> AppConfig {
        AppConfig {
            counter_store_url: String::new(),
            log_broker_addrs: String::new(),
            database_url: "postgres://unused/unused".to_string(),
            admission_cap_per_sec: 10_000,
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

    fn test_state() -> AppState {
        AppState::new(
            Arc::new(InMemoryCounterStore::new()),
            Arc::new(InMemoryReservationProducer::new()),
            Arc::new(test_config()),
        )
    }

    #[tokio::test]
    async fn order_without_idempotency_header_is_bad_request() {
        let state = test_state();
        state.counter_store.init_stock("widget", 10).await.unwrap();

        let outcome = handle_order(
            state,
            HeaderMap::new(),
            OrderRequest {
                product_id: "widget".to_string(),
                user_id: "alice".to_string(),
            },
        )
        .await;

        assert!(matches!(outcome, Outcome::BadRequest(_)));
    }

    #[tokio::test]
    async fn order_on_empty_stock_is_sold_out() {
        let state = test_state();
        state.counter_store.init_stock("widget", 0).await.unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(IDEMPOTENCY_HEADER, "tok-1".parse().unwrap());

        let outcome = handle_order(
            state,
            headers,
            OrderRequest {
                product_id: "widget".to_string(),
                user_id: "alice".to_string(),
            },
        )
        .await;

        assert!(matches!(outcome, Outcome::SoldOut));
    }

    #[tokio::test]
    async fn repeated_idempotency_token_is_ignored_on_second_request() {
        let state = test_state();
        state.counter_store.init_stock("widget", 10).await.unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(IDEMPOTENCY_HEADER, "tok-1".parse().unwrap());

        let first = handle_order(
            state.clone(),
            headers.clone(),
            OrderRequest {
                product_id: "widget".to_string(),
                user_id: "alice".to_string(),
            },
        )
        .await;
        let second = handle_order(
            state,
            headers,
            OrderRequest {
                product_id: "widget".to_string(),
                user_id: "alice".to_string(),
            },
        )
        .await;

        assert!(matches!(first, Outcome::Accepted { .. }));
        assert!(matches!(second, Outcome::Duplicate));
    }

    #[tokio::test]
    async fn producer_failure_after_reserve_yields_internal_error_and_keeps_stock_decremented() {
        let counter_store = Arc::new(InMemoryCounterStore::new());
        counter_store.init_stock("widget", 10).await.unwrap();

        let fake_producer = InMemoryReservationProducer::new();
        fake_producer.fail_next_produce();
        let state = AppState::new(
            counter_store.clone(),
            Arc::new(fake_producer),
            Arc::new(test_config()),
        );

        let mut headers = HeaderMap::new();
        headers.insert(IDEMPOTENCY_HEADER, "tok-2".parse().unwrap());

        let outcome = handle_order(
            state.clone(),
            headers,
            OrderRequest {
                product_id: "widget".to_string(),
                user_id: "alice".to_string(),
            },
        )
        .await;

        assert!(matches!(outcome, Outcome::Internal(_)));
        assert!(!state.counter_store.idempotency_check("tok-2").await.unwrap());
    }
}
