//! Wire and storage types shared across the gateway and the worker.

use serde::{Deserialize, Serialize};

use crate::core_types::{ProductId, ReservationId, UnixMillis, UserId};

/// The durable-log envelope produced by ingestion and consumed by the
/// fulfillment worker (spec §6: topic `orders`, JSON value).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReservationEvent {
    #[serde(rename = "orderId")]
    pub reservation_id: ReservationId,
    #[serde(rename = "productId")]
    pub product_id: ProductId,
    #[serde(rename = "userId")]
    pub user_id: UserId,
    pub timestamp: UnixMillis,
}

impl ReservationEvent {
    pub fn new(product_id: ProductId, user_id: UserId, timestamp: UnixMillis) -> Self {
        Self {
            reservation_id: uuid::Uuid::new_v4(),
            product_id,
            user_id,
            timestamp,
        }
    }
}

/// `products` row (record of truth).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: ProductId,
    pub stock: i64,
}

/// `orders` row (record of truth). Keyed by the reservation id, which is
/// what makes the worker's insert idempotent across redelivery.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Order {
    pub id: String,
    pub product_id: ProductId,
    pub user_id: UserId,
    pub created_at: chrono::DateTime<chrono::Utc>,
}
