//! Health check handler.
//!
//! Provides the health endpoint for liveness and readiness probes.

use crate::models::HealthResponse;
use crate::routes::AppState;
use axum::extract::State;
use axum::Json;
use std::sync::Arc;
use tracing::instrument;

/// Health check handler.
///
/// Pings the viewer counter store and reports the service status.
///
/// ## Response
///
/// Always 200 with:
/// - `status`: "healthy" if the counter store answers, "unhealthy" otherwise
/// - `counter`: "healthy" / "unhealthy"
///
/// ## Example Response
///
/// ```json
/// {
///   "status": "healthy",
///   "counter": "healthy"
/// }
/// ```
#[instrument(skip_all, name = "sc.health.check")]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let counter_healthy = state.counter.ping().await.is_ok();

    // Unhealthy is still a 200 so the probe sees the body
    let (status, counter) = if counter_healthy {
        ("healthy", "healthy")
    } else {
        tracing::warn!(target: "sc.handlers.health", "Health check: counter store unreachable");
        ("unhealthy", "unhealthy")
    };

    Json(HealthResponse {
        status: status.to_string(),
        counter: counter.to_string(),
    })
}
