//! The record of truth: the transactional Postgres store of products and
//! orders, the audit authority (spec §3, §6).

use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{Pool, Postgres};
use std::time::Duration;

const DEFAULT_POOL_SIZE: u32 = 10;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of [`RecordOfTruth::reserve_and_insert`], so the worker's
/// offset-commit decision (spec §4.2 step 6) is a plain match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FulfillmentOutcome {
    /// The conditional decrement affected a row and the order insert ran.
    Committed,
    /// The conditional decrement affected zero rows: durable stock and
    /// counter-store stock have diverged. The offset must be withheld.
    Diverged,
    /// The order id already existed: this is a redelivery of a message
    /// already fulfilled. No-op, safe to commit the offset (spec P5).
    AlreadyProcessed,
}

/// Thin wrapper over `sqlx::PgPool`, grounded on the teacher's pool-setup
/// idiom: bounded max connections, an explicit acquire timeout, and a
/// cheap health check usable from a readiness probe.
pub struct RecordOfTruth {
    pool: Pool<Postgres>,
}

impl RecordOfTruth {
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let max_connections = std::env::var("PG_POOL_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_POOL_SIZE);

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Creates `products` and `orders` (spec §6 schema) if absent. Part of
    /// the worker's bootstrap surface (spec §4.3).
    pub async fn ensure_schema(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS products (
                id    TEXT PRIMARY KEY,
                stock BIGINT NOT NULL CHECK (stock >= 0)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS orders (
                id         TEXT PRIMARY KEY,
                product_id TEXT NOT NULL,
                user_id    TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS orders_product_id_idx ON orders (product_id)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Inserts the product row if absent (`ON CONFLICT DO NOTHING`),
    /// idempotent across worker restarts.
    pub async fn seed_product(&self, product_id: &str, stock: i64) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT INTO products (id, stock) VALUES ($1, $2) ON CONFLICT (id) DO NOTHING")
            .bind(product_id)
            .bind(stock)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// The single transaction of spec §4.2 steps 2-5: conditional
    /// decrement, conflict-tolerant insert, commit.
    pub async fn reserve_and_insert(
        &self,
        reservation_id: &str,
        product_id: &str,
        user_id: &str,
        created_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<FulfillmentOutcome, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let existing: Option<PgRow> = sqlx::query("SELECT id FROM orders WHERE id = $1")
            .bind(reservation_id)
            .fetch_optional(&mut *tx)
            .await?;
        if existing.is_some() {
            tx.commit().await?;
            return Ok(FulfillmentOutcome::AlreadyProcessed);
        }

        let decremented = sqlx::query(
            "UPDATE products SET stock = stock - 1 WHERE id = $1 AND stock > 0",
        )
        .bind(product_id)
        .execute(&mut *tx)
        .await?;

        if decremented.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(FulfillmentOutcome::Diverged);
        }

        sqlx::query(
            "INSERT INTO orders (id, product_id, user_id, created_at) VALUES ($1, $2, $3, $4)
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(reservation_id)
        .bind(product_id)
        .bind(user_id)
        .bind(created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(FulfillmentOutcome::Committed)
    }
}
