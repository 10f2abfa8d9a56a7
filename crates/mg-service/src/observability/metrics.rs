//! Metrics definitions for Media Gateway.
//!
//! All metrics follow Prometheus naming conventions:
//! - `mg_` prefix for Media Gateway
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `method`: 7 values max (GET, POST, PATCH, DELETE, PUT, HEAD, OPTIONS)
//! - `endpoint`: known routes plus "/other"
//! - `status`: 3 values (success, error, timeout)
//! - `outcome`: the auth failure categories plus "accepted"
//! - `result`: JWKS fetch outcomes, bounded by code

use metrics::{counter, histogram};
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
            Matcher::Prefix("mg_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.150, 0.200, 0.300, 0.500, 1.000, 2.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        // JWKS fetches include a remote round trip and a timeout up to
        // tens of seconds, so buckets extend further out
        .set_buckets_for_metric(
            Matcher::Prefix("mg_jwks_fetch".to_string()),
            &[
                0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000,
            ],
        )
        .map_err(|e| format!("Failed to set JWKS fetch buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `mg_http_requests_total`, `mg_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
///
/// This captures ALL HTTP responses including framework-level errors like:
/// - 400 Bad Request (JSON parse errors)
/// - 404 Not Found
/// - 405 Method Not Allowed
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    // Normalize endpoint to prevent cardinality explosion
    let normalized_endpoint = normalize_endpoint(endpoint);

    let status = categorize_status_code(status_code);

    histogram!("mg_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint.clone(),
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("mg_http_requests_total",
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

/// Normalize endpoint path to prevent label cardinality explosion.
///
/// Every route this service exposes is static; anything else is an
/// unknown path and collapses to "/other".
fn normalize_endpoint(path: &str) -> String {
    match path {
        "/" => "/".to_string(),
        "/health" => "/health".to_string(),
        "/metrics" => "/metrics".to_string(),
        "/api/v1/me" => "/api/v1/me".to_string(),
        _ => "/other".to_string(),
    }
}

// ============================================================================
// Authentication Metrics
// ============================================================================

/// Record the outcome of one pass through the authentication gate.
///
/// Metric: `mg_auth_requests_total`
/// Labels: `outcome` ("accepted" or an `AuthError` category)
pub fn record_auth_outcome(outcome: &str) {
    counter!("mg_auth_requests_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

// ============================================================================
// JWKS Fetch Metrics
// ============================================================================

/// Record one attempted JWKS fetch.
///
/// Metric: `mg_jwks_fetches_total`
/// Labels: `result` ("ok", "http_error", "network_error", "parse_error",
/// "rate_limited")
pub fn record_jwks_fetch(result: &str) {
    counter!("mg_jwks_fetches_total",
        "result" => result.to_string()
    )
    .increment(1);
}

// ============================================================================
// Tests
// ============================================================================
