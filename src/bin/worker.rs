//! Fulfillment worker binary: consumes the orders topic and writes the
//! record of truth transactionally (spec §4.2, §4.3).

use flashgate::config::AppConfig;
use flashgate::durable_log::KafkaReservationConsumer;
use flashgate::logging::init_logging;
use flashgate::record_of_truth::RecordOfTruth;
use flashgate::worker::consume::KafkaDeadLetterSink;
use flashgate::worker::{bootstrap, consume};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    init_logging(&config);

    let store = RecordOfTruth::connect(&config.database_url).await?;
    bootstrap::run(&store, &config.bootstrap_product_id, config.bootstrap_product_stock).await?;

    let consumer = KafkaReservationConsumer::new(
        &config.log_broker_addrs,
        &config.consumer_group_id,
        &config.orders_topic,
    )?;
    let dead_letter = KafkaDeadLetterSink::new(&config.log_broker_addrs)?;

    tracing::info!(topic = %config.orders_topic, group = %config.consumer_group_id, "worker consuming");
    consume::run(consumer, &store, &config.orders_topic, &dead_letter).await?;

    Ok(())
}
