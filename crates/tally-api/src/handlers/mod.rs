//! HTTP request handlers for the tally API.
//!
//! Handlers follow a consistent pattern: validate input, log with tracing
//! fields, touch storage through the repository layer, and return
//! standardized JSON responses. The ingestion handler is the only write
//! path; it must never wait on classification.

pub mod health;
pub mod ingest;

pub use health::{health_check, liveness_check, readiness_check};
pub use ingest::ingest_events;
