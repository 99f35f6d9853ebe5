//! # quill-app
//!
//! Application layer — the metrics synchronization core and its **port
//! definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `CounterStore` — atomic integer counters and like-membership markers
//!   - `MessagePublisher` / `MessageSubscriber` — topic pub/sub with per-message settlement
//!   - `PostRepository` — durable post aggregate with targeted counter writes
//! - Define **driving/inbound ports** as use-case structs:
//!   - `MetricsService` — like, unlike, record views, read metrics
//!   - `MetricsSyncConsumer` — reconcile the durable aggregate from bus events
//! - Provide **in-process infrastructure** (counter store, message bus) that doesn't need IO
//!
//! ## Dependency rule
//! Depends on `quill-domain` only (plus `tokio` for channels, timers and tasks).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod counter_store;
pub mod message_bus;
pub mod metrics_consumer;
pub mod ports;
pub mod services;
