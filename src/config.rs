//! Application configuration, loaded from environment variables.
//!
//! No config file: every deployment knob from the external-interfaces
//! section of the spec is an env var with a sane default for local
//! development, following the same `std::env::var(..).unwrap_or_else(..)`
//! discipline the rest of this codebase uses for its external
//! dependencies (counter store, broker, record-of-truth connection).

use std::time::Duration;

/// Process-wide configuration, shared (read-only) by ingestion and worker.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Counter store (Redis-compatible) connection URL.
    pub counter_store_url: String,
    /// Durable log (Kafka-compatible) bootstrap server list.
    pub log_broker_addrs: String,
    /// Record-of-truth (Postgres) connection string. No default: a
    /// missing `DATABASE_URL` is a startup error, not a silent stub.
    pub database_url: String,
    /// Admission cap: requests per whole-second bucket before throttling.
    pub admission_cap_per_sec: u64,
    /// Redirect target for throttled requests.
    pub waiting_room_url: String,
    /// Durable log topic carrying reservation events.
    pub orders_topic: String,
    /// Consumer group id for the fulfillment worker.
    pub consumer_group_id: String,
    /// Idempotency marker expiry.
    pub idempotency_ttl: Duration,
    /// Rate-limit bucket expiry. Must be at least two bucket widths so a
    /// bucket never expires before the next bucket has been created.
    pub rate_bucket_ttl: Duration,
    /// Ingestion HTTP bind address.
    pub ingestion_bind_addr: String,
    /// Product id seeded into the durable store at worker bootstrap
    /// (spec §4.3's "seeds a known product row if absent").
    pub bootstrap_product_id: String,
    /// Initial durable stock for `bootstrap_product_id`.
    pub bootstrap_product_stock: i64,
    /// `tracing` env-filter directive.
    pub log_level: String,
    /// Emit JSON-formatted logs instead of human-readable text.
    pub log_json: bool,
}

impl AppConfig {
    /// Load configuration from the process environment.
    ///
    /// Loads a `.env` file first if present (development convenience);
    /// real environment variables always take precedence.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::Missing("DATABASE_URL"))?;

        let admission_cap_per_sec = std::env::var("ADMISSION_CAP")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(1_000);

        let rate_bucket_ttl_secs: u64 = std::env::var("RATE_BUCKET_TTL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(2)
            .max(2);

        let idempotency_ttl_secs: u64 = std::env::var("IDEMPOTENCY_TTL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(60);

        Ok(Self {
            counter_store_url: std::env::var("COUNTER_STORE_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            log_broker_addrs: std::env::var("LOG_BROKER_ADDRS")
                .unwrap_or_else(|_| "localhost:9092".to_string()),
            database_url,
            admission_cap_per_sec,
            waiting_room_url: std::env::var("WAITING_ROOM_URL")
                .unwrap_or_else(|_| "https://example.invalid/wait".to_string()),
            orders_topic: std::env::var("ORDERS_TOPIC").unwrap_or_else(|_| "orders".to_string()),
            consumer_group_id: std::env::var("CONSUMER_GROUP_ID")
                .unwrap_or_else(|_| "inventory-group".to_string()),
            idempotency_ttl: Duration::from_secs(idempotency_ttl_secs),
            rate_bucket_ttl: Duration::from_secs(rate_bucket_ttl_secs),
            ingestion_bind_addr: std::env::var("INGESTION_BIND_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            bootstrap_product_id: std::env::var("BOOTSTRAP_PRODUCT_ID")
                .unwrap_or_else(|_| "iphone-15".to_string()),
            bootstrap_product_stock: std::env::var("BOOTSTRAP_PRODUCT_STOCK")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(100),
            log_level: std::env::var("LOG_LEVEL")
                .or_else(|_| std::env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),
            log_json: std::env::var("LOG_JSON")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    // Both assertions share one test function: env vars are process-global,
    // so two tests mutating them could race under the default parallel
    // test runner.
    #[test]
    fn from_env_validates_database_url_and_clamps_rate_bucket_ttl() {
        unsafe {
            std::env::remove_var("DATABASE_URL");
        }
        assert!(matches!(
            AppConfig::from_env(),
            Err(ConfigError::Missing("DATABASE_URL"))
        ));

        unsafe {
            std::env::set_var("DATABASE_URL", "postgres://test/test");
            std::env::set_var("RATE_BUCKET_TTL_SECS", "1");
        }
        let cfg = AppConfig::from_env().unwrap();
        assert_eq!(cfg.rate_bucket_ttl, Duration::from_secs(2));

        unsafe {
            std::env::remove_var("RATE_BUCKET_TTL_SECS");
            std::env::remove_var("DATABASE_URL");
        }
    }
}
