//! Worker bootstrap surface (spec §4.3): ensure the schema exists and
//! seed the configured product row, once, before the consume loop starts.

use crate::record_of_truth::RecordOfTruth;

pub async fn run(
    store: &RecordOfTruth,
    product_id: &str,
    initial_stock: i64,
) -> Result<(), sqlx::Error> {
    store.ensure_schema().await?;
    store.seed_product(product_id, initial_stock).await?;
    tracing::info!(product_id, initial_stock, "worker bootstrap complete");
    Ok(())
}
