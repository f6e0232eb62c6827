//! Metrics definitions for Passage authentication.
//!
//! All metrics follow Prometheus naming conventions:
//! - `passage_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded by code:
//! - `status`: success, error, timeout
//! - `result`: hit, refetched, not_found, rate_limited, error
//! - `outcome`: success, extraction_failed, invalid_token
//! - `operation`: one value per management API call
//! - `endpoint`: the example backend's static routes

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
        // Authentication is on every protected request; cache hits are sub-ms
        .set_buckets_for_metric(
            Matcher::Prefix("passage_authentication".to_string()),
            &[
                0.0005, 0.001, 0.002, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000,
            ],
        )
        .map_err(|e| format!("Failed to set authentication buckets: {e}"))?
        // JWKS fetches are remote calls bounded by the fetch timeout
        .set_buckets_for_metric(
            Matcher::Prefix("passage_jwks_fetch".to_string()),
            &[
                0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000,
            ],
        )
        .map_err(|e| format!("Failed to set JWKS fetch buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("passage_api_request".to_string()),
            &[
                0.010, 0.025, 0.050, 0.100, 0.200, 0.500, 1.000, 2.000, 5.000,
            ],
        )
        .map_err(|e| format!("Failed to set API request buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("passage_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.150, 0.200, 0.300, 0.500, 1.000, 2.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// Key Store Metrics
// ============================================================================

/// Record a JWKS fetch.
///
/// Metric: `passage_jwks_fetch_total`, `passage_jwks_fetch_duration_seconds`
/// Labels: `status`
pub fn record_jwks_fetch(status: &str, duration: Duration) {
    histogram!("passage_jwks_fetch_duration_seconds",
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("passage_jwks_fetch_total",
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record the result of a key lookup by `kid`.
///
/// Metric: `passage_key_lookup_total`
/// Labels: `result`
pub fn record_key_lookup(result: &str) {
    counter!("passage_key_lookup_total",
        "result" => result.to_string()
    )
    .increment(1);
}

// ============================================================================
// Authentication Metrics
// ============================================================================

/// Record one `authenticate_request` call.
///
/// Metric: `passage_authentication_total`, `passage_authentication_duration_seconds`
/// Labels: `outcome`
pub fn record_authentication(outcome: &str, duration: Duration) {
    histogram!("passage_authentication_duration_seconds",
        "outcome" => outcome.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("passage_authentication_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

// ============================================================================
// Management API Metrics
// ============================================================================

/// Record a management API call.
///
/// Metric: `passage_api_requests_total`, `passage_api_request_duration_seconds`
/// Labels: `operation`, `status`
pub fn record_api_request(operation: &str, status: &str, duration: Duration) {
    histogram!("passage_api_request_duration_seconds",
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("passage_api_requests_total",
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion for the example backend.
///
/// Metric: `passage_http_requests_total`, `passage_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("passage_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint.to_string(),
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("passage_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint.to_string(),
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

/// Collapse unknown paths to keep label cardinality bounded.
fn normalize_endpoint(path: &str) -> &'static str {
    match path {
        "/" => "/",
        "/health" => "/health",
        "/metrics" => "/metrics",
        "/auth" => "/auth",
        _ => "/other",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The metrics crate records to a global no-op recorder when none is
    // installed, so these only exercise the recording paths.

    #[test]
    fn test_record_jwks_fetch() {
        record_jwks_fetch("success", Duration::from_millis(40));
        record_jwks_fetch("error", Duration::from_secs(10));
    }

    #[test]
    fn test_record_key_lookup() {
        for result in ["hit", "refetched", "not_found", "rate_limited", "error"] {
            record_key_lookup(result);
        }
    }

    #[test]
    fn test_record_authentication() {
        record_authentication("success", Duration::from_micros(300));
        record_authentication("extraction_failed", Duration::from_micros(5));
        record_authentication("invalid_token", Duration::from_millis(2));
    }

    #[test]
    fn test_record_api_request() {
        record_api_request("get_user", "success", Duration::from_millis(80));
        record_api_request("delete_user", "error", Duration::from_millis(120));
    }

    #[test]
    fn test_record_http_request() {
        record_http_request("POST", "/auth", 200, Duration::from_millis(5));
        record_http_request("POST", "/auth", 401, Duration::from_millis(1));
        record_http_request("GET", "/nope/123", 404, Duration::from_millis(1));
    }

    #[test]
    fn test_categorize_status_code() {
        assert_eq!(categorize_status_code(200), "success");
        assert_eq!(categorize_status_code(204), "success");
        assert_eq!(categorize_status_code(408), "timeout");
        assert_eq!(categorize_status_code(504), "timeout");
        assert_eq!(categorize_status_code(401), "error");
        assert_eq!(categorize_status_code(500), "error");
    }

    #[test]
    fn test_normalize_endpoint() {
        assert_eq!(normalize_endpoint("/health"), "/health");
        assert_eq!(normalize_endpoint("/auth"), "/auth");
        assert_eq!(normalize_endpoint("/users/usr_123"), "/other");
    }
}
