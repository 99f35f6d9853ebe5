//! # quill-adapter-http-axum
//!
//! HTTP adapter built on [axum](https://docs.rs/axum).
//!
//! ## Responsibilities
//! - Serve the **post metrics endpoints** (`/api/posts/{id}/metrics`,
//!   `/api/posts/{id}/views`, `/api/posts/{id}/like`) and `/health`
//! - Map HTTP requests into `MetricsService` calls (driving adapter)
//! - Map application results and errors into JSON responses
//!
//! Authentication happens upstream: the acting user arrives in the
//! `x-user-id` header.
//!
//! ## Dependency rule
//! Depends on `quill-app` (for port traits and services) and `quill-domain`
//! (for domain types used in request/response mapping). Never leaks axum types
//! into the domain.

pub mod api;
pub mod error;
pub mod router;
pub mod state;
