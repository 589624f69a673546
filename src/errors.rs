//! Error taxonomy, shared by ingestion and worker, plus the unified HTTP
//! error/response wrapper used at the gateway's edge.
//!
//! `AppError` is the internal error type every module returns. `ApiError`
//! / `ApiResponse<T>` are the wire-level shapes, generalized from the
//! teacher's `gateway/types/response.rs` unified response wrapper.

use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;

/// Internal error type. Every external round trip (counter store,
/// durable log, record of truth) funnels into one of these variants so
/// the hot path (spec §4.1) can match on *kind* of failure, not on
/// library-specific error types.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("counter store error: {0}")]
    CounterStore(String),

    #[error("durable log error: {0}")]
    DurableLog(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        AppError::CounterStore(err.to_string())
    }
}

impl From<rdkafka::error::KafkaError> for AppError {
    fn from(err: rdkafka::error::KafkaError) -> Self {
        AppError::DurableLog(err.to_string())
    }
}

// ============================================================================
// Unified API Response Format
// ============================================================================

/// Unified API response envelope.
///
/// - `status`: short machine-readable outcome tag ("success", "ignored",
///   "sold_out", "error", ...), matching spec §6's response bodies.
/// - `msg`: human-readable message.
#[derive(Debug, Serialize)]
pub struct ApiResponse {
    pub status: &'static str,
    pub msg: String,
}

impl ApiResponse {
    pub fn new(status: &'static str, msg: impl Into<String>) -> Self {
        Self {
            status,
            msg: msg.into(),
        }
    }
}

/// Unified API error with automatic `IntoResponse`.
#[derive(Debug)]
pub struct ApiError {
    pub http_status: StatusCode,
    pub status: &'static str,
    pub msg: String,
}

impl ApiError {
    pub fn new(http_status: StatusCode, status: &'static str, msg: impl Into<String>) -> Self {
        Self {
            http_status,
            status,
            msg: msg.into(),
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "error", msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "error", msg)
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        // Every AppError reaching the edge is a transient-external or
        // database failure (spec §7): validation failures are rejected
        // before they can become an AppError, so this mapping is always
        // the 500 path.
        ApiError::internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.http_status, Json(ApiResponse::new(self.status, self.msg))).into_response()
    }
}
