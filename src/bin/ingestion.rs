//! Ingestion binary: admission, idempotency, and atomic reservation over
//! HTTP (spec §4.1).

use std::sync::Arc;

use flashgate::config::AppConfig;
use flashgate::counter_store::RedisCounterStore;
use flashgate::durable_log::KafkaReservationProducer;
use flashgate::ingestion::routes::build_router;
use flashgate::ingestion::state::AppState;
use flashgate::logging::init_logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    init_logging(&config);

    let counter_store = Arc::new(RedisCounterStore::connect(&config.counter_store_url).await?);
    let producer = Arc::new(KafkaReservationProducer::new(
        &config.log_broker_addrs,
        config.orders_topic.clone(),
    )?);

    let bind_addr = config.ingestion_bind_addr.clone();
    let state = AppState::new(counter_store, producer, Arc::new(config));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(%bind_addr, "ingestion listening");
    axum::serve(listener, app).await?;

    Ok(())
}
