//! Flash-sale ingestion and fulfillment: an admission-gated, idempotent
//! reservation gateway backed by an atomic counter store, with a durable
//! log handing reservations off to a transactional fulfillment worker.
//!
//! # Modules
//!
//! - [`core_types`] - opaque id type aliases shared across every module
//! - [`config`] - environment-sourced process configuration
//! - [`logging`] - structured `tracing` setup shared by both binaries
//! - [`errors`] - internal error taxonomy and the HTTP error envelope
//! - [`models`] - wire and storage types
//! - [`counter_store`] - atomic stock/rate-limit/idempotency store
//! - [`durable_log`] - the at-least-once ingestion-to-worker hand-off
//! - [`record_of_truth`] - the transactional Postgres order ledger
//! - [`ingestion`] - the HTTP gateway (`/init`, `/order`, `/health`)
//! - [`worker`] - the fulfillment worker's bootstrap and consume loop

// Core types - must be first!
pub mod core_types;

// Configuration and ambient stack
pub mod config;
pub mod errors;
pub mod logging;

// Domain types and external collaborators
pub mod counter_store;
pub mod durable_log;
pub mod models;
pub mod record_of_truth;

// Services
pub mod ingestion;
pub mod worker;
