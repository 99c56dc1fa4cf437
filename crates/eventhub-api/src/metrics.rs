//! Prometheus metrics
//!
//! Process-wide collectors registered in the default registry. Rendered as
//! text at `/metrics`.

use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge, Encoder, HistogramVec,
    IntCounterVec, IntGauge, TextEncoder,
};

lazy_static::lazy_static! {
    /// HTTP requests by normalized endpoint, method and status
    static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "eventhub_http_requests_total",
        "HTTP requests by endpoint and status",
        &["endpoint", "method", "status"]
    ).expect("Prometheus metrics registration should succeed at startup");

    /// HTTP request latency
    static ref HTTP_REQUEST_DURATION: HistogramVec = register_histogram_vec!(
        "eventhub_http_request_duration_seconds",
        "HTTP request latency",
        &["endpoint", "method"],
        vec![0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    ).expect("Prometheus metrics registration should succeed at startup");

    /// Authentication outcomes by operation (login, refresh, register, ...)
    static ref AUTH_OUTCOMES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "eventhub_auth_outcomes_total",
        "Authentication operations by outcome",
        &["operation", "outcome"]
    ).expect("Prometheus metrics registration should succeed at startup");

    /// Jobs waiting for a hashing worker
    static ref WORKER_POOL_QUEUE_DEPTH: IntGauge = register_int_gauge!(
        "eventhub_worker_pool_queue_depth",
        "Jobs waiting for a worker pool permit"
    ).expect("Prometheus metrics registration should succeed at startup");

    /// Jobs rejected because the queue was full
    static ref WORKER_POOL_REJECTIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "eventhub_worker_pool_rejections_total",
        "Jobs rejected by a saturated worker pool",
        &["reason"]
    ).expect("Prometheus metrics registration should succeed at startup");
}

pub fn record_http_request(endpoint: &str, method: &str, status: u16, elapsed_secs: f64) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[endpoint, method, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION
        .with_label_values(&[endpoint, method])
        .observe(elapsed_secs);
}

/// Count one authentication outcome, e.g. `("login", "success")`
pub fn record_auth_outcome(operation: &str, outcome: &str) {
    AUTH_OUTCOMES_TOTAL
        .with_label_values(&[operation, outcome])
        .inc();
}

pub fn set_pool_queue_depth(depth: usize) {
    WORKER_POOL_QUEUE_DEPTH.set(depth as i64);
}

pub fn record_pool_rejection() {
    WORKER_POOL_REJECTIONS_TOTAL
        .with_label_values(&["queue_full"])
        .inc();
}

/// Encode every registered metric family in the text exposition format
pub fn render() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;

    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_includes_recorded_metrics() {
        record_http_request("/api/v1/auth/login", "POST", 200, 0.02);
        record_auth_outcome("login", "success");
        record_pool_rejection();
        set_pool_queue_depth(0);

        let output = render().unwrap();
        assert!(output.contains("eventhub_http_requests_total"));
        assert!(output.contains("eventhub_auth_outcomes_total"));
        assert!(output.contains("eventhub_worker_pool_rejections_total"));
        assert!(output.contains("eventhub_worker_pool_queue_depth"));
    }
}
