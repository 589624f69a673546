//! The fulfillment worker's main loop (spec §4.2).

use std::collections::HashMap;

use chrono::TimeZone;

use crate::durable_log::{CommitToken, ReservationConsumer};
use crate::models::ReservationEvent;
use crate::record_of_truth::{FulfillmentOutcome, RecordOfTruth};

/// After this many consecutive divergences on the same reservation id, stop
/// retrying in place and route the message to the dead-letter topic
/// instead of blocking the rest of the partition (spec §4.2's documented
/// MAY).
const MAX_DIVERGENCE_RETRIES: u32 = 5;

/// Runs the consume loop until the consumer's stream ends (never, in
/// production) or an unrecoverable consumer error occurs.
pub async fn run(
    mut consumer: impl ReservationConsumer,
    store: &RecordOfTruth,
    orders_topic: &str,
    dead_letter: &impl DeadLetterSink,
) -> Result<(), crate::errors::AppError> {
    let mut divergence_retries: HashMap<String, u32> = HashMap::new();

    loop {
        let message = consumer.next().await?;

        let event: ReservationEvent = match serde_json::from_slice(&message.payload) {
            Ok(event) => event,
            Err(err) => {
                // 1. Poison message: log and skip, offset still advances.
                tracing::error!(error = %err, "failed to parse reservation envelope; skipping");
                consumer.commit(message.commit_token).await?;
                continue;
            }
        };

        process_one(
            &mut consumer,
            store,
            orders_topic,
            dead_letter,
            &mut divergence_retries,
            event,
            message.commit_token,
        )
        .await?;
    }
}

async fn process_one(
    consumer: &mut impl ReservationConsumer,
    store: &RecordOfTruth,
    orders_topic: &str,
    dead_letter: &impl DeadLetterSink,
    divergence_retries: &mut HashMap<String, u32>,
    event: ReservationEvent,
    commit_token: CommitToken,
) -> Result<(), crate::errors::AppError> {
    let created_at = chrono::Utc
        .timestamp_millis_opt(event.timestamp)
        .single()
        .unwrap_or_else(chrono::Utc::now);

    let outcome = store
        .reserve_and_insert(
            &event.reservation_id.to_string(),
            &event.product_id,
            &event.user_id,
            created_at,
        )
        .await?;

    match outcome {
        FulfillmentOutcome::Committed | FulfillmentOutcome::AlreadyProcessed => {
            divergence_retries.remove(&event.reservation_id.to_string());
            // 5/6: transaction already committed inside reserve_and_insert;
            // commit the offset only now (spec §4.2's invariant).
            consumer.commit(commit_token).await?;
        }
        FulfillmentOutcome::Diverged => {
            let key = event.reservation_id.to_string();
            let retries = divergence_retries.entry(key.clone()).or_insert(0);
            *retries += 1;

            tracing::error!(
                reservation_id = %event.reservation_id,
                product_id = %event.product_id,
                user_id = %event.user_id,
                retries = *retries,
                "durable stock divergence: counter store and record of truth disagree",
            );

            if *retries >= MAX_DIVERGENCE_RETRIES {
                dead_letter
                    .send(&format!("{orders_topic}.dlq"), &event)
                    .await?;
                divergence_retries.remove(&key);
                consumer.commit(commit_token).await?;
            }
            // Otherwise withhold the offset: the broker will redeliver.
        }
    }

    Ok(())
}

#[async_trait::async_trait]
pub trait DeadLetterSink: Send + Sync {
    async fn send(&self, topic: &str, event: &ReservationEvent) -> Result<(), crate::errors::AppError>;
}

/// Production dead-letter sink: a bare `FutureProducer` with no fixed
/// topic, since the topic it writes to (`{orders_topic}.dlq`) is derived
/// per call rather than configured once like [`crate::durable_log::KafkaReservationProducer`].
pub struct KafkaDeadLetterSink {
    producer: rdkafka::producer::FutureProducer,
}

impl KafkaDeadLetterSink {
    pub fn new(broker_addrs: &str) -> Result<Self, crate::errors::AppError> {
        let producer = rdkafka::ClientConfig::new()
            .set("bootstrap.servers", broker_addrs)
            .set("message.timeout.ms", "5000")
            .create()?;
        Ok(Self { producer })
    }
}

#[async_trait::async_trait]
impl DeadLetterSink for KafkaDeadLetterSink {
    async fn send(&self, topic: &str, event: &ReservationEvent) -> Result<(), crate::errors::AppError> {
        let payload = serde_json::to_vec(event)?;
        let record = rdkafka::producer::FutureRecord::to(topic)
            .payload(&payload)
            .key(&event.product_id);

        self.producer
            .send(record, rdkafka::util::Timeout::After(std::time::Duration::from_secs(5)))
            .await
            .map_err(|(err, _owned_message)| crate::errors::AppError::from(err))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::durable_log::ConsumedMessage;
    use std::collections::VecDeque;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    struct NullDeadLetter {
        sent: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait::async_trait]
    impl DeadLetterSink for NullDeadLetter {
        async fn send(
            &self,
            topic: &str,
            _event: &ReservationEvent,
        ) -> Result<(), crate::errors::AppError> {
            self.sent.lock().await.push(topic.to_string());
            Ok(())
        }
    }

    /// A consumer fake driven by a fixed queue of payloads, recording
    /// which offsets were committed, for exercising `process_one` without
    /// a live broker.
    struct QueueConsumer {
        items: VecDeque<Vec<u8>>,
        committed: Arc<Mutex<Vec<i64>>>,
        next_offset: i64,
    }

    #[async_trait::async_trait]
    impl ReservationConsumer for QueueConsumer {
        async fn next(&mut self) -> Result<ConsumedMessage, crate::errors::AppError> {
            let payload = self.items.pop_front().unwrap_or_default();
            let offset = self.next_offset;
            self.next_offset += 1;
            Ok(ConsumedMessage {
                payload,
                commit_token: CommitToken {
                    topic: "orders".to_string(),
                    partition: 0,
                    offset,
                },
            })
        }

        async fn commit(&mut self, token: CommitToken) -> Result<(), crate::errors::AppError> {
            self.committed.lock().await.push(token.offset);
            Ok(())
        }
    }

    #[tokio::test]
    async fn poison_message_is_skipped_and_offset_still_advances() {
        let mut consumer = QueueConsumer {
            items: VecDeque::from([b"not json".to_vec()]),
            committed: Arc::new(Mutex::new(Vec::new())),
            next_offset: 0,
        };
        let committed = consumer.committed.clone();

        let message = consumer.next().await.unwrap();
        assert!(serde_json::from_slice::<ReservationEvent>(&message.payload).is_err());
        consumer.commit(message.commit_token).await.unwrap();

        assert_eq!(*committed.lock().await, vec![0]);
    }

    #[tokio::test]
    async fn dead_letter_sink_receives_the_derived_dlq_topic_name() {
        let sink = NullDeadLetter {
            sent: Arc::new(Mutex::new(Vec::new())),
        };
        let event = ReservationEvent::new("widget".to_string(), "alice".to_string(), 0);

        sink.send("orders.dlq", &event).await.unwrap();

        assert_eq!(*sink.sent.lock().await, vec!["orders.dlq".to_string()]);
    }
}
