//! The durable log: the at-least-once hand-off between ingestion and the
//! fulfillment worker (spec §4.1 step 5, §4.2, §6).
//!
//! [`ReservationProducer`] is implemented by [`KafkaReservationProducer`]
//! in production and [`InMemoryReservationProducer`] in tests. The worker
//! side, [`ReservationConsumer`], is implemented by
//! [`KafkaReservationConsumer`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rdkafka::Message;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use rdkafka::{ClientConfig, Offset, TopicPartitionList};
use tokio::sync::Mutex;

use crate::errors::AppError;
use crate::models::ReservationEvent;

const PRODUCE_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// Producer side (ingestion)
// ============================================================================

#[async_trait]
pub trait ReservationProducer: Send + Sync {
    /// Produce a single reservation event, keyed by product id (spec §6:
    /// "SHOULD be keyed by productId when partition count > 1"), and wait
    /// for broker acknowledgment before returning.
    async fn produce(&self, event: &ReservationEvent) -> Result<(), AppError>;
}

pub struct KafkaReservationProducer {
    producer: FutureProducer,
    topic: String,
}

impl KafkaReservationProducer {
    pub fn new(broker_addrs: &str, topic: String) -> Result<Self, AppError> {
        let producer = ClientConfig::new()
            .set("bootstrap.servers", broker_addrs)
            .set("message.timeout.ms", "5000")
            .create()?;
        Ok(Self { producer, topic })
    }
}

#[async_trait]
impl ReservationProducer for KafkaReservationProducer {
    async fn produce(&self, event: &ReservationEvent) -> Result<(), AppError> {
        let payload = serde_json::to_vec(event)?;
        let record = FutureRecord::to(&self.topic)
            .payload(&payload)
            .key(&event.product_id);

        self.producer
            .send(record, Timeout::After(PRODUCE_TIMEOUT))
            .await
            .map_err(|(err, _owned_message)| AppError::from(err))?;
        Ok(())
    }
}

/// In-memory fake producer for handler-level tests. `fail_next` lets a
/// test simulate the partial-failure window of spec §4.1 step 5 (scenario
/// 5): the atomic reserve already happened, only the durable write fails.
#[derive(Clone, Default)]
pub struct InMemoryReservationProducer {
    events: Arc<Mutex<Vec<ReservationEvent>>>,
    fail_next: Arc<AtomicBool>,
}

impl InMemoryReservationProducer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_produce(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub async fn produced(&self) -> Vec<ReservationEvent> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl ReservationProducer for InMemoryReservationProducer {
    async fn produce(&self, event: &ReservationEvent) -> Result<(), AppError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(AppError::DurableLog("simulated broker outage".to_string()));
        }
        self.events.lock().await.push(event.clone());
        Ok(())
    }
}

// ============================================================================
// Consumer side (fulfillment worker)
// ============================================================================

/// Opaque handle identifying where in the log a delivered message sits,
/// so the worker can commit *after* its transaction commits (spec §4.2
/// invariant) without re-borrowing the original broker message.
#[derive(Debug, Clone)]
pub struct CommitToken {
    pub(crate) topic: String,
    pub(crate) partition: i32,
    pub(crate) offset: i64,
}

pub struct ConsumedMessage {
    pub payload: Vec<u8>,
    pub commit_token: CommitToken,
}

#[async_trait]
pub trait ReservationConsumer: Send {
    async fn next(&mut self) -> Result<ConsumedMessage, AppError>;
    async fn commit(&mut self, token: CommitToken) -> Result<(), AppError>;
}

pub struct KafkaReservationConsumer {
    consumer: StreamConsumer,
}

impl KafkaReservationConsumer {
    pub fn new(broker_addrs: &str, group_id: &str, topic: &str) -> Result<Self, AppError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", broker_addrs)
            .set("group.id", group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .create()?;
        consumer.subscribe(&[topic])?;
        Ok(Self { consumer })
    }
}

#[async_trait]
impl ReservationConsumer for KafkaReservationConsumer {
    async fn next(&mut self) -> Result<ConsumedMessage, AppError> {
        let message = self.consumer.recv().await?;
        let payload = message.payload().unwrap_or(&[]).to_vec();
        let commit_token = CommitToken {
            topic: message.topic().to_string(),
            partition: message.partition(),
            offset: message.offset(),
        };
        Ok(ConsumedMessage {
            payload,
            commit_token,
        })
    }

    async fn commit(&mut self, token: CommitToken) -> Result<(), AppError> {
        let mut tpl = TopicPartitionList::new();
        tpl.add_partition_offset(&token.topic, token.partition, Offset::Offset(token.offset + 1))
            .map_err(|e| AppError::DurableLog(e.to_string()))?;
        self.consumer
            .commit(&tpl, rdkafka::consumer::CommitMode::Sync)?;
        Ok(())
    }
}
