//! Tally HTTP API.
//!
//! The only write surface is the webhook ingestion endpoint; everything
//! else is health probes. Classification happens in the background
//! pipeline, never on the request path.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::sync::Arc;

use tally_core::{storage::Storage, Clock};

pub mod config;
pub mod handlers;
pub mod server;

pub use config::Config;
pub use server::{create_router, start_server};

/// Shared state for request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Repository container backing all handlers.
    pub storage: Storage,
    /// Clock used to stamp ingested events.
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Creates handler state over the given storage and clock.
    pub fn new(storage: Storage, clock: Arc<dyn Clock>) -> Self {
        Self { storage, clock }
    }
}
