//! # quill-adapter-redis
//!
//! Redis-backed counter store.
//!
//! ## Responsibilities
//! - Implement the `CounterStore` port defined in `quill-app::ports`
//! - Own a reconnecting connection (`redis::aio::ConnectionManager`)
//! - Map each port operation onto a single atomic Redis command
//!
//! ## Dependency rule
//! Depends on `quill-app` (for port traits) and `quill-domain` (for error types).
//! The `app` and `domain` crates must never reference this adapter.

pub mod counter_store;
pub mod error;

pub use counter_store::{Config, RedisCounterStore};
pub use error::RedisStoreError;
