use std::sync::Arc;

use crate::config::AppConfig;
use crate::counter_store::CounterStore;
use crate::durable_log::ReservationProducer;

/// Ingestion's shared state: a bundle of `Arc`s, no other shared mutable
/// in-process state (spec §5's "no shared mutable in-process state"
/// invariant — every stateful decision happens in the counter store).
#[derive(Clone)]
pub struct AppState {
    pub counter_store: Arc<dyn CounterStore>,
    pub producer: Arc<dyn ReservationProducer>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(
        counter_store: Arc<dyn CounterStore>,
        producer: Arc<dyn ReservationProducer>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            counter_store,
            producer,
            config,
        }
    }
}
