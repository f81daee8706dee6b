use crate::error::{GateError, Result};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Metrics service for collecting and exposing Prometheus metrics
#[derive(Clone)]
pub struct MetricsService {
    handle: Arc<PrometheusHandle>,
}

impl MetricsService {
    /// Create a new metrics service
    pub fn new() -> Result<Self> {
        let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
            GateError::Internal(format!("Failed to install metrics recorder: {}", e))
        })?;

        Self::register_metrics();

        info!("Metrics service initialized successfully");

        Ok(Self {
            handle: Arc::new(handle),
        })
    }

    /// Register all metrics with descriptions
    fn register_metrics() {
        describe_counter!(
            "gate_requests_total",
            "Total number of requests forwarded to the upstream"
        );
        describe_histogram!(
            "gate_request_duration_seconds",
            "Upstream request latencies in seconds"
        );
        describe_counter!(
            "gate_requests_errors_total",
            "Total number of forwarded requests that resulted in errors"
        );

        describe_counter!(
            "gate_decisions_total",
            "Route guard decisions by decision and path classification"
        );

        describe_counter!(
            "gate_session_refresh_total",
            "Session refresh calls by outcome"
        );
        describe_histogram!(
            "gate_session_refresh_duration_seconds",
            "Identity provider refresh latencies in seconds"
        );

        debug!("All metrics registered with descriptions");
    }

    /// Render metrics in Prometheus format
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Metrics endpoint handler
pub async fn metrics_handler(State(service): State<MetricsService>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        service.render(),
    )
}

/// Record a forwarded request
pub fn record_request(method: &str, path: &str, status: u16, duration: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!("gate_requests_total", &labels).increment(1);
    histogram!("gate_request_duration_seconds", &labels).record(duration);

    if status >= 400 {
        counter!("gate_requests_errors_total", &labels).increment(1);
    }
}

/// Record a route guard decision
pub fn record_guard_decision(decision: &str, classification: &str) {
    let labels = [
        ("decision", decision.to_string()),
        ("classification", classification.to_string()),
    ];
    counter!("gate_decisions_total", &labels).increment(1);
}

/// Record a session refresh; outcome is `authenticated`, `anonymous` or `error`
pub fn record_session_refresh(outcome: &str, duration: f64) {
    let labels = [("outcome", outcome.to_string())];
    counter!("gate_session_refresh_total", &labels).increment(1);
    histogram!("gate_session_refresh_duration_seconds", &labels).record(duration);
}

/// Sanitize path for metrics to avoid cardinality explosion
fn sanitize_path(path: &str) -> String {
    path.split('/')
        .map(|seg| {
            if is_likely_id(seg) {
                ":id".to_string()
            } else {
                seg.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Check if a path segment is likely an ID (numeric, UUID, etc.)
fn is_likely_id(segment: &str) -> bool {
    if segment.is_empty() {
        return false;
    }

    if segment.chars().all(|c| c.is_numeric()) {
        return true;
    }

    if segment.len() >= 32 && segment.contains('-') {
        return segment.chars().all(|c| c.is_ascii_hexdigit() || c == '-');
    }

    // Long mixed alphanumerics like "abc123def456"
    if segment.len() > 10 && segment.chars().all(|c| c.is_alphanumeric()) {
        let has_numbers = segment.chars().any(|c| c.is_numeric());
        let has_letters = segment.chars().any(|c| c.is_alphabetic());
        return has_numbers && has_letters;
    }

    false
}

/// Timer for measuring forwarded request duration
pub struct Timer {
    start: Instant,
    method: String,
    path: String,
}

impl Timer {
    /// Start a new timer for a request
    pub fn new(method: String, path: String) -> Self {
        Self {
            start: Instant::now(),
            method,
            path,
        }
    }

    /// Record the elapsed time with the given status code
    pub fn record(self, status: u16) {
        record_request(&self.method, &self.path, status, self.elapsed());
    }

    /// Get the elapsed time in seconds
    pub fn elapsed(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_path() {
        assert_eq!(sanitize_path("/admin/users/123"), "/admin/users/:id");
        assert_eq!(
            sanitize_path("/dashboard/reports/550e8400-e29b-41d4-a716-446655440000"),
            "/dashboard/reports/:id"
        );
        assert_eq!(sanitize_path("/dashboard"), "/dashboard");
        assert_eq!(sanitize_path("/"), "/");
    }

    #[test]
    fn test_is_likely_id() {
        assert!(is_likely_id("123"));
        assert!(is_likely_id("550e8400-e29b-41d4-a716-446655440000"));
        assert!(is_likely_id("abc123def456ghi789"));
        assert!(!is_likely_id("analytics"));
        assert!(!is_likely_id("settings"));
        assert!(!is_likely_id(""));
    }

    #[test]
    fn test_timer_creation() {
        let timer = Timer::new("GET".to_string(), "/dashboard".to_string());
        assert_eq!(timer.method, "GET");
        assert_eq!(timer.path, "/dashboard");
        assert!(timer.elapsed() >= 0.0);
    }

    #[test]
    fn test_record_functions_dont_panic() {
        // These functions should not panic even if recorder isn't installed
        record_request("GET", "/dashboard", 200, 0.123);
        record_guard_decision("redirect_login", "protected");
        record_session_refresh("anonymous", 0.01);
    }
}
