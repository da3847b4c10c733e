//! Prometheus metrics for the request pipeline.
//!
//! Metrics are exposed on a dedicated listener (default: `0.0.0.0:9090`).
//! Recording functions are safe to call before or without initialization;
//! they become no-ops when no recorder is installed.
//!
//! # Available Metrics
//!
//! ## Counters
//! - `blog_rate_limited_total` - Requests rejected by the token bucket limiter (label: route)
//! - `blog_panics_recovered_total` - Handler panics contained by the recovery layer
//! - `blog_alerts_total` - Alert outcomes (label: outcome)
//!
//! ## Histograms
//! - `blog_request_duration_seconds` - Request duration (labels: method, status)
//!
//! ## Gauges
//! - `blog_token_buckets` - Token buckets currently resident in the limiter

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::{error, info};

/// Metric names as constants for consistency.
pub mod names {
    pub const RATE_LIMITED_TOTAL: &str = "blog_rate_limited_total";
    pub const PANICS_RECOVERED_TOTAL: &str = "blog_panics_recovered_total";
    pub const ALERTS_TOTAL: &str = "blog_alerts_total";
    pub const REQUEST_DURATION_SECONDS: &str = "blog_request_duration_seconds";
    pub const TOKEN_BUCKETS: &str = "blog_token_buckets";
}

/// Install the Prometheus exporter and describe all metrics.
///
/// # Errors
///
/// Fails if the listener cannot be bound or a recorder is already installed.
pub fn init_metrics(metrics_addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        names::RATE_LIMITED_TOTAL,
        "Total number of requests rejected by the rate limiter"
    );
    describe_counter!(
        names::PANICS_RECOVERED_TOTAL,
        "Total number of handler panics converted into 500 responses"
    );
    describe_counter!(
        names::ALERTS_TOTAL,
        "Operator alerts by outcome (queued, sent, failed, throttled, queue_full, closed)"
    );
    describe_histogram!(
        names::REQUEST_DURATION_SECONDS,
        "HTTP request duration in seconds"
    );
    describe_gauge!(
        names::TOKEN_BUCKETS,
        "Number of token buckets held by the rate limiter"
    );

    info!(addr = %metrics_addr, "Prometheus metrics endpoint started");
    Ok(())
}

/// Try to initialize metrics, logging any errors but not failing.
pub fn try_init_metrics(metrics_addr: SocketAddr) {
    if let Err(e) = init_metrics(metrics_addr) {
        error!(error = %e, "Failed to initialize metrics, continuing without metrics");
    }
}

/// Record a request rejected by the limiter, labeled with the matched rule.
pub fn record_rate_limited(route: &str) {
    counter!(names::RATE_LIMITED_TOTAL, "route" => route.to_string()).increment(1);
}

pub fn record_panic_recovered() {
    counter!(names::PANICS_RECOVERED_TOTAL).increment(1);
}

pub fn record_alert(outcome: &'static str) {
    counter!(names::ALERTS_TOTAL, "outcome" => outcome).increment(1);
}

/// Record HTTP request duration.
pub fn record_request_duration(method: &str, status: u16, duration_secs: f64) {
    histogram!(
        names::REQUEST_DURATION_SECONDS,
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .record(duration_secs);
}

pub fn set_token_buckets(count: usize) {
    gauge!(names::TOKEN_BUCKETS).set(count as f64);
}
