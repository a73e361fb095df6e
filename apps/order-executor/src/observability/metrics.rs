//! Prometheus metrics for the order executor.
//!
//! Counters for messages consumed, rejected and dispatched, plus venue
//! call latency. Recording is a no-op until [`init_metrics`] installs the
//! exporter.
//!
//! # Example
//!
//! ```ignore
//! use order_executor::observability::{init_metrics, MetricsConfig};
//!
//! init_metrics(&MetricsConfig::with_port(9090))?;
//! record_dispatch("alpaca", "create", "success", 0.042);
//! ```

use std::net::{Ipv4Addr, SocketAddr};

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Configuration for the metrics exporter.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Address to bind the metrics HTTP listener.
    pub listen_addr: SocketAddr,
    /// Histogram buckets for venue call latency (in seconds).
    pub latency_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self::with_port(9090)
    }
}

impl MetricsConfig {
    /// Listen on all interfaces at `port`.
    #[must_use]
    pub fn with_port(port: u16) -> Self {
        Self {
            listen_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)),
            // Venue round trips, 10ms to 30s
            latency_buckets: vec![0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0],
        }
    }
}

/// Initialize the Prometheus metrics exporter.
///
/// This starts an HTTP server that exposes metrics at `/metrics`.
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    PrometheusBuilder::new()
        .with_http_listener(config.listen_addr)
        .set_buckets(&config.latency_buckets)
        .map_err(|e| MetricsError::Configuration(e.to_string()))?
        .install()
        .map_err(|e| MetricsError::Installation(e.to_string()))?;

    tracing::info!(
        addr = %config.listen_addr,
        "Prometheus metrics exporter started"
    );

    Ok(())
}

/// Error type for metrics operations.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// Failed to configure metrics exporter.
    #[error("metrics configuration error: {0}")]
    Configuration(String),
    /// Failed to install metrics exporter.
    #[error("metrics installation error: {0}")]
    Installation(String),
}

// ============================================================================
// Consumer Metrics
// ============================================================================

/// Record a message pulled from the queue.
pub fn record_message_received(venue: &str) {
    counter!("executor_messages_received_total", "venue" => venue.to_string()).increment(1);
}

/// Record a message dropped by validation.
///
/// * `kind` - `malformed_payload`, `unknown_operation` or `schema_violation`
pub fn record_message_rejected(venue: &str, kind: &str) {
    counter!(
        "executor_messages_rejected_total",
        "venue" => venue.to_string(),
        "kind" => kind.to_string()
    )
    .increment(1);
}

/// Record a failed acknowledgement.
pub fn record_ack_failure(venue: &str) {
    counter!("executor_ack_failures_total", "venue" => venue.to_string()).increment(1);
}

// ============================================================================
// Dispatch Metrics
// ============================================================================

/// Record a venue call made for a command.
///
/// * `operation` - `create` or `cancel`
/// * `outcome` - `success` or an error kind
/// * `latency_seconds` - Time spent in the venue call
pub fn record_dispatch(venue: &str, operation: &str, outcome: &str, latency_seconds: f64) {
    counter!(
        "executor_commands_dispatched_total",
        "venue" => venue.to_string(),
        "operation" => operation.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    histogram!(
        "executor_venue_latency_seconds",
        "venue" => venue.to_string(),
        "operation" => operation.to_string()
    )
    .record(latency_seconds);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_with_port() {
        let config = MetricsConfig::with_port(9191);
        assert_eq!(config.listen_addr.port(), 9191);
        assert!(config.listen_addr.ip().is_unspecified());
    }

    #[test]
    fn recording_without_exporter_is_noop() {
        record_message_received("paper");
        record_message_rejected("paper", "schema_violation");
        record_dispatch("paper", "create", "success", 0.01);
        record_ack_failure("paper");
    }
}
