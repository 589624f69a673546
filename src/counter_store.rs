//! The counter store: per-product stock, rate-limit tallies, and
//! idempotency markers, all behind one atomic-script discipline (spec §3,
//! §4.1, §6).
//!
//! [`CounterStore`] is implemented twice: [`RedisCounterStore`] against a
//! real Redis-compatible server, and [`InMemoryCounterStore`] for
//! handler- and property-level tests that need the same atomicity
//! guarantees without a live dependency.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::Mutex;

use crate::errors::AppError;

#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Administrative: overwrite `product:{id}:stock`. Idempotent by
    /// construction — a retry simply re-sets the same value.
    async fn init_stock(&self, product_id: &str, quantity: i64) -> Result<(), AppError>;

    /// The atomic reservation script of spec §4.1 step 4: read, test
    /// `>= 1`, decrement — as one indivisible operation. Returns `true`
    /// iff a unit was reserved.
    async fn try_reserve(&self, product_id: &str) -> Result<bool, AppError>;

    /// Admission/rate shaping of spec §4.1 step 1: increment the bucket
    /// counter, attach an expiry on first touch, return whether the
    /// resulting count is within `cap`.
    async fn admit(&self, bucket_key: &str, cap: u64, ttl: Duration) -> Result<bool, AppError>;

    /// Idempotency lookup of spec §4.1 step 3.
    async fn idempotency_check(&self, token: &str) -> Result<bool, AppError>;

    /// Idempotency marking of spec §4.1 step 6.
    async fn idempotency_mark(&self, token: &str, ttl: Duration) -> Result<(), AppError>;
}

// ============================================================================
// Redis-backed implementation
// ============================================================================

/// Lua script for the atomic reservation: indivisible read-test-decrement
/// against a single key, no client-side race window.
const RESERVE_SCRIPT: &str = r#"
local stock = tonumber(redis.call('GET', KEYS[1]) or '0')
if stock >= 1 then
    redis.call('DECRBY', KEYS[1], 1)
    return 1
else
    return 0
end
"#;

/// Lua script for the rate-limit bucket: increment, and on first touch in
/// this bucket attach an expiry so the key disappears after the window.
const ADMIT_SCRIPT: &str = r#"
local count = redis.call('INCR', KEYS[1])
if count == 1 then
    redis.call('EXPIRE', KEYS[1], ARGV[1])
end
return count
"#;

pub struct RedisCounterStore {
    conn: ConnectionManager,
    reserve_script: redis::Script,
    admit_script: redis::Script,
}

impl RedisCounterStore {
    pub async fn connect(url: &str) -> Result<Self, AppError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self {
            conn,
            reserve_script: redis::Script::new(RESERVE_SCRIPT),
            admit_script: redis::Script::new(ADMIT_SCRIPT),
        })
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn init_stock(&self, product_id: &str, quantity: i64) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        let key = format!("product:{}:stock", product_id);
        conn.set::<_, _, ()>(key, quantity).await?;
        Ok(())
    }

    async fn try_reserve(&self, product_id: &str) -> Result<bool, AppError> {
        let mut conn = self.conn.clone();
        let key = format!("product:{}:stock", product_id);
        let result: i64 = self
            .reserve_script
            .key(key)
            .invoke_async(&mut conn)
            .await?;
        Ok(result == 1)
    }

    async fn admit(&self, bucket_key: &str, cap: u64, ttl: Duration) -> Result<bool, AppError> {
        let mut conn = self.conn.clone();
        let key = format!("rate:{}", bucket_key);
        let count: u64 = self
            .admit_script
            .key(key)
            .arg(ttl.as_secs())
            .invoke_async(&mut conn)
            .await?;
        Ok(count <= cap)
    }

    async fn idempotency_check(&self, token: &str) -> Result<bool, AppError> {
        let mut conn = self.conn.clone();
        let key = format!("idempotency:{}", token);
        let exists: bool = conn.exists(key).await?;
        Ok(exists)
    }

    async fn idempotency_mark(&self, token: &str, ttl: Duration) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        let key = format!("idempotency:{}", token);
        conn.set_ex::<_, _, ()>(key, 1, ttl.as_secs()).await?;
        Ok(())
    }
}

// ============================================================================
// In-memory fake, for handler and property tests
// ============================================================================

#[derive(Default)]
struct InMemoryState {
    stock: HashMap<String, i64>,
    rate_buckets: HashMap<String, u64>,
    idempotency: HashSet<String>,
}

/// In-memory [`CounterStore`], serializing every operation behind one
/// mutex. The point is not performance — it's that `try_reserve` behaves
/// with the same indivisible read-test-decrement semantics a real Redis
/// `EVAL` gives us, so tests that hammer it concurrently exercise real
/// contention, not a stub that happens to never race.
#[derive(Clone, Default)]
pub struct InMemoryCounterStore {
    state: Arc<Mutex<InMemoryState>>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn init_stock(&self, product_id: &str, quantity: i64) -> Result<(), AppError> {
        let mut state = self.state.lock().await;
        state.stock.insert(product_id.to_string(), quantity);
        Ok(())
    }

    async fn try_reserve(&self, product_id: &str) -> Result<bool, AppError> {
        let mut state = self.state.lock().await;
        match state.stock.get_mut(product_id) {
            Some(stock) if *stock >= 1 => {
                *stock -= 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn admit(&self, bucket_key: &str, cap: u64, _ttl: Duration) -> Result<bool, AppError> {
        let mut state = self.state.lock().await;
        let count = state.rate_buckets.entry(bucket_key.to_string()).or_insert(0);
        *count += 1;
        Ok(*count <= cap)
    }

    async fn idempotency_check(&self, token: &str) -> Result<bool, AppError> {
        let state = self.state.lock().await;
        Ok(state.idempotency.contains(token))
    }

    async fn idempotency_mark(&self, token: &str, _ttl: Duration) -> Result<(), AppError> {
        let mut state = self.state.lock().await;
        state.idempotency.insert(token.to_string());
        Ok(())
    }
}
