//! Webhook ingestion handler.
//!
//! Accepts the provider's delivery-event batches and appends each item to
//! the raw event store, uninterpreted. Durability is the whole contract:
//! no campaign lookups, no classification, no waiting on downstream
//! processing. This keeps spiky provider bursts decoupled from the cost of
//! folding, which involves several dependent writes per event.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde::Serialize;
use tally_core::models::RawEvent;
use tracing::{error, info, instrument, warn};

use crate::AppState;

/// Maximum accepted batch body size.
const MAX_BATCH_BYTES: usize = 10 * 1024 * 1024;

/// Response from a successful batch accept.
#[derive(Debug, Serialize)]
pub struct IngestResponse {
    /// Number of events appended to the raw store.
    pub accepted: usize,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error details.
    pub error: ErrorDetail,
}

/// Detailed error information.
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    /// Human-readable error description.
    pub message: String,
}

/// Ingests a batch of provider delivery events.
///
/// The provider posts a JSON array of envelope objects; a single object is
/// treated as a batch of one. Every element becomes one unprocessed raw
/// event stamped with the same arrival time, appended in array order.
/// Items are attempted independently; the response reflects the accept
/// step as a whole:
///
/// - 200 with `{"accepted": n}` once every raw write is durable
/// - 400 if the body is not JSON
/// - 413 if the body exceeds the size cap
/// - 500 if any write failed; the provider is expected to redeliver
#[instrument(name = "ingest_events", skip(state, body), fields(body_bytes = body.len()))]
pub async fn ingest_events(State(state): State<AppState>, body: Bytes) -> Response {
    if body.len() > MAX_BATCH_BYTES {
        warn!(body_bytes = body.len(), limit = MAX_BATCH_BYTES, "batch exceeds size limit");
        return error_response(StatusCode::PAYLOAD_TOO_LARGE, "batch exceeds size limit");
    }

    let parsed: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "batch body is not valid JSON");
            return error_response(StatusCode::BAD_REQUEST, "request body must be JSON");
        },
    };

    let items = into_batch(parsed);
    let received_at = state.clock.now();

    let mut accepted = 0usize;
    let mut failures = 0usize;
    for payload in items {
        let event = RawEvent::new(payload, received_at);
        match state.storage.raw_events.append(&event).await {
            Ok(_) => accepted += 1,
            Err(e) => {
                error!(event_id = %event.id, error = %e, "failed to append raw event");
                failures += 1;
            },
        }
    }

    if failures > 0 {
        error!(accepted, failures, "batch accept failed; provider should redeliver");
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "event store write failed");
    }

    info!(accepted, "batch accepted");
    (StatusCode::OK, Json(IngestResponse { accepted })).into_response()
}

/// Normalizes a request body into an ordered batch of payloads.
///
/// The provider always sends an array, but some integrations post a bare
/// envelope object; both are accepted.
fn into_batch(value: serde_json::Value) -> Vec<serde_json::Value> {
    match value {
        serde_json::Value::Array(items) => items,
        other => vec![other],
    }
}

/// Creates a standardized error response.
fn error_response(status: StatusCode, message: &str) -> Response {
    let body = ErrorResponse { error: ErrorDetail { message: message.to_string() } };
    (status, Json(body)).into_response()
}
