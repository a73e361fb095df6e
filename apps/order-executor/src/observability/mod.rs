//! Observability module for metrics, tracing, and logging.

mod metrics;
mod tracing;

pub use self::metrics::{
    MetricsConfig, MetricsError, init_metrics, record_ack_failure, record_dispatch,
    record_message_received, record_message_rejected,
};
pub use self::tracing::{
    LogFormat, TracingConfig, TracingError, TracingGuard, init_tracing, service_name_for,
};
