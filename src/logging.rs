//! Structured logging setup, shared by both binaries.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::AppConfig;

/// Initialize the global `tracing` subscriber.
///
/// Honors `RUST_LOG` if set (so operators can override at will);
/// otherwise falls back to `config.log_level`. Emits JSON when
/// `config.log_json` is set — for shipping to a log aggregator — and
/// human-readable ANSI text otherwise.
pub fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));

    let registry = tracing_subscriber::registry().with(filter);

    if config.log_json {
        registry.with(fmt::layer().json().with_target(true)).init();
    } else {
        registry
            .with(fmt::layer().with_target(false))
            .init();
    }
}
