//! # quill-domain
//!
//! Pure domain model for the quill post metrics pipeline.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps and clocks
//! - Define the durable **Post** aggregate and its targeted counter updates
//! - Define **metric kinds** and the counter-store key layout
//! - Define **metrics events** (absolute-value facts), their wire encoding,
//!   and the topic **topology** they travel on
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod clock;
pub mod error;
pub mod id;

pub mod event;
pub mod metrics;
pub mod post;
