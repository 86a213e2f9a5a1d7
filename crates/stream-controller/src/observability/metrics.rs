//! Metrics definitions for the Stream Controller.
//!
//! All metrics follow Prometheus naming conventions:
//! - `sc_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `endpoint`: the fixed route set, everything else is `/other`
//! - `operation`: bounded by code (start, end, create_room, ...)
//! - `status`: success, error, or a `PlatformError` label
//! - `scope`: publisher, viewer

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("sc_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        // Platform calls are remote round-trips bounded by the request timeout
        .set_buckets_for_metric(
            Matcher::Prefix("sc_platform_call".to_string()),
            &[
                0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.000, 5.000, 10.000,
            ],
        )
        .map_err(|e| format!("Failed to set platform call buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `sc_http_requests_total`, `sc_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("sc_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("sc_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

/// Categorize HTTP status code into success/error/timeout
fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Map a request path onto the fixed route set.
fn normalize_endpoint(path: &str) -> &'static str {
    match path {
        "/start" => "/start",
        "/end" => "/end",
        "/streamerToken" => "/streamerToken",
        "/audienceToken" => "/audienceToken",
        "/audienceCount" => "/audienceCount",
        "/audienceCount/join" => "/audienceCount/join",
        "/audienceCount/leave" => "/audienceCount/leave",
        "/health" => "/health",
        "/metrics" => "/metrics",
        _ => "/other",
    }
}

// ============================================================================
// Session Metrics
// ============================================================================

/// Record a session start or end outcome.
///
/// Metric: `sc_session_operations_total`
/// Labels: `operation` (start, end), `status` (success or error kind)
pub fn record_session_operation(operation: &'static str, status: &'static str) {
    counter!("sc_session_operations_total",
        "operation" => operation,
        "status" => status
    )
    .increment(1);
}

// ============================================================================
// Platform Metrics
// ============================================================================

/// Record one platform round-trip.
///
/// Metric: `sc_platform_calls_total`, `sc_platform_call_duration_seconds`
/// Labels: `operation`, `status`
pub fn record_platform_call(operation: &'static str, status: &'static str, duration: Duration) {
    histogram!("sc_platform_call_duration_seconds",
        "operation" => operation
    )
    .record(duration.as_secs_f64());

    counter!("sc_platform_calls_total",
        "operation" => operation,
        "status" => status
    )
    .increment(1);
}

// ============================================================================
// Credential Metrics
// ============================================================================

/// Record a credential request outcome.
///
/// Metric: `sc_credentials_issued_total`
/// Labels: `scope` (publisher, viewer), `status` (issued, no_active_stream, error)
pub fn record_credential(scope: &'static str, status: &'static str) {
    counter!("sc_credentials_issued_total",
        "scope" => scope,
        "status" => status
    )
    .increment(1);
}

// ============================================================================
// Audience Metrics
// ============================================================================

/// Publish the latest observed viewer count.
///
/// Metric: `sc_viewer_count` (gauge)
pub fn set_viewer_count(count: u64) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("sc_viewer_count").set(count as f64);
}
