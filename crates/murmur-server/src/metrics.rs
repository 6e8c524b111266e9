//! Metrics collection and export for murmur.
//!
//! Uses the `metrics` crate for instrumentation and exports
//! to Prometheus format.

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use murmur_core::RouterStats;
use std::net::SocketAddr;
use tracing::info;

/// Metric names.
pub mod names {
    pub const LOGINS_TOTAL: &str = "murmur_logins_total";
    pub const LOGOUTS_TOTAL: &str = "murmur_logouts_total";
    pub const MESSAGES_TOTAL: &str = "murmur_messages_total";
    pub const API_ERRORS_TOTAL: &str = "murmur_api_errors_total";
    pub const LISTEN_SESSIONS_TOTAL: &str = "murmur_listen_sessions_total";
    pub const LISTENERS_ACTIVE: &str = "murmur_listeners_active";
    pub const FRAMES_DELIVERED_TOTAL: &str = "murmur_frames_delivered_total";
    pub const FRAMES_DROPPED_TOTAL: &str = "murmur_frames_dropped_total";
}

/// Initialize the metrics system.
pub fn init_metrics() {
    metrics::describe_counter!(names::LOGINS_TOTAL, "Successful logins since server start");
    metrics::describe_counter!(names::LOGOUTS_TOTAL, "Explicit logouts since server start");
    metrics::describe_counter!(
        names::MESSAGES_TOTAL,
        "Accepted chat messages, labelled public or private"
    );
    metrics::describe_counter!(names::API_ERRORS_TOTAL, "Failed API calls by error kind");
    metrics::describe_counter!(
        names::LISTEN_SESSIONS_TOTAL,
        "Listen streams opened since server start"
    );
    metrics::describe_gauge!(names::LISTENERS_ACTIVE, "Currently open listen streams");
    metrics::describe_counter!(
        names::FRAMES_DELIVERED_TOTAL,
        "Frames enqueued into recipient mailboxes"
    );
    metrics::describe_counter!(
        names::FRAMES_DROPPED_TOTAL,
        "Frames dropped because a mailbox was full"
    );

    info!("Metrics initialized");
}

/// Start the Prometheus metrics server.
///
/// # Errors
///
/// Returns an error if the server cannot be started.
pub fn start_metrics_server(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    info!("Metrics server listening on {}", addr);
    Ok(())
}

pub fn record_login() {
    counter!(names::LOGINS_TOTAL).increment(1);
}

pub fn record_logout() {
    counter!(names::LOGOUTS_TOTAL).increment(1);
}

/// Record an accepted message of the given kind (`public` or `private`).
pub fn record_message(kind: &'static str) {
    counter!(names::MESSAGES_TOTAL, "kind" => kind).increment(1);
}

/// Record a failed API call.
pub fn record_api_error(kind: &'static str) {
    counter!(names::API_ERRORS_TOTAL, "kind" => kind).increment(1);
}

/// Mirror the router's running totals.
pub fn record_router_stats(stats: &RouterStats) {
    counter!(names::FRAMES_DELIVERED_TOTAL).absolute(stats.delivered);
    counter!(names::FRAMES_DROPPED_TOTAL).absolute(stats.dropped);
}

/// Metrics guard that tracks one open listen stream.
pub struct ListenerMetricsGuard;

impl ListenerMetricsGuard {
    /// Create a new metrics guard, recording a listen session.
    #[must_use]
    pub fn new() -> Self {
        counter!(names::LISTEN_SESSIONS_TOTAL).increment(1);
        gauge!(names::LISTENERS_ACTIVE).increment(1.0);
        Self
    }
}

impl Default for ListenerMetricsGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ListenerMetricsGuard {
    fn drop(&mut self) {
        gauge!(names::LISTENERS_ACTIVE).decrement(1.0);
    }
}
