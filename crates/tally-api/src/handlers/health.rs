//! Health check handlers for service monitoring.
//!
//! Provides liveness, readiness, and health endpoints with database
//! connectivity checks for orchestration systems.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, instrument};

use crate::AppState;

/// Health check response structure.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall service health status.
    pub status: HealthStatus,
    /// Timestamp when the health check was performed.
    pub timestamp: DateTime<Utc>,
    /// Individual component health checks.
    pub checks: HealthChecks,
    /// Service version information.
    pub version: String,
}

/// Overall health status enumeration.
#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// All systems operational.
    Healthy,
    /// Critical systems failing.
    Unhealthy,
}

/// Individual component health check results.
#[derive(Debug, Serialize)]
pub struct HealthChecks {
    /// Database connectivity and basic query test.
    pub database: ComponentHealth,
}

/// Health status for an individual component.
#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    /// Component status.
    pub status: ComponentStatus,
    /// Optional error message if unhealthy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Response time in milliseconds.
    pub response_time_ms: i64,
}

/// Component-level health status.
#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    /// Component is healthy.
    Up,
    /// Component is experiencing issues.
    Down,
}

/// Primary health check endpoint.
///
/// Designed to be called frequently by orchestration systems and load
/// balancers, so it avoids expensive operations: one lightweight database
/// round trip.
#[instrument(name = "health_check", skip(state))]
pub async fn health_check(State(state): State<AppState>) -> Response {
    let started_at = state.clock.now();

    let database = match state.storage.health_check().await {
        Ok(()) => {
            debug!("database health check passed");
            ComponentHealth {
                status: ComponentStatus::Up,
                message: None,
                response_time_ms: (state.clock.now() - started_at).num_milliseconds(),
            }
        },
        Err(e) => {
            error!(error = %e, "database health check failed");
            ComponentHealth {
                status: ComponentStatus::Down,
                message: Some(format!("Database connection failed: {e}")),
                response_time_ms: (state.clock.now() - started_at).num_milliseconds(),
            }
        },
    };

    let (overall, status_code) = match database.status {
        ComponentStatus::Up => (HealthStatus::Healthy, StatusCode::OK),
        ComponentStatus::Down => (HealthStatus::Unhealthy, StatusCode::SERVICE_UNAVAILABLE),
    };

    let response = HealthResponse {
        status: overall,
        timestamp: started_at,
        checks: HealthChecks { database },
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    (status_code, Json(response)).into_response()
}

/// Readiness check endpoint for orchestration probes.
///
/// Currently identical to the health check; kept as a separate route so
/// startup-specific checks can be added without changing probe wiring.
#[instrument(name = "readiness_check", skip(state))]
pub async fn readiness_check(State(state): State<AppState>) -> Response {
    health_check(State(state)).await
}

/// Liveness check endpoint for orchestration probes.
///
/// Minimal check that does not touch external dependencies; only verifies
/// the HTTP server is responding.
#[instrument(name = "liveness_check", skip(state))]
pub async fn liveness_check(State(state): State<AppState>) -> Response {
    let response = serde_json::json!({
        "status": "alive",
        "timestamp": state.clock.now(),
        "service": "tally-api"
    });

    (StatusCode::OK, Json(response)).into_response()
}
