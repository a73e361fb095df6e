//! Structured logging and optional OpenTelemetry export.
//!
//! Every log line is a JSON object (or a human-readable line in `pretty`
//! mode). The worker runs inside a span carrying `service`, so each event
//! is tagged `executor-<venue>`.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Full filter directive; overrides `LOG_LEVEL`
//! - `LOG_LEVEL`: Minimum severity (default: info)
//! - `LOG_FORMAT`: json | pretty (default: json)
//! - `OTEL_ENABLED`: Export spans over OTLP (default: false)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: http://localhost:4317)

use opentelemetry::KeyValue;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Default OTLP endpoint.
const DEFAULT_OTLP_ENDPOINT: &str = "http://localhost:4317";

/// Service name used before the venue is known.
const DEFAULT_SERVICE_NAME: &str = "order-executor";

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Human-readable lines for local runs.
    Pretty,
}

impl std::str::FromStr for LogFormat {
    type Err = TracingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" | "text" => Ok(Self::Pretty),
            _ => Err(TracingError::invalid("LOG_FORMAT", s, "expected json or pretty")),
        }
    }
}

/// Configuration for logging and tracing.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Service name attached to logs and spans.
    pub service_name: String,
    /// Service version for resource attributes.
    pub service_version: String,
    /// Default filter when `RUST_LOG` is unset.
    pub log_level: String,
    /// Log line format.
    pub format: LogFormat,
    /// Whether spans are exported over OTLP.
    pub otel_enabled: bool,
    /// OTLP endpoint URL.
    pub otlp_endpoint: String,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            log_level: "info".to_string(),
            format: LogFormat::Json,
            otel_enabled: false,
            otlp_endpoint: DEFAULT_OTLP_ENDPOINT.to_string(),
        }
    }
}

impl TracingConfig {
    /// Create configuration from environment variables.
    ///
    /// The service name is `executor-<venue>` when `EXECUTOR_VENUE` is set.
    pub fn from_env() -> Result<Self, TracingError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable lookup.
    ///
    /// Unknown `LOG_FORMAT` or `OTEL_ENABLED` values are refused rather than
    /// replaced with defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, TracingError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let set = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let service_name = set("EXECUTOR_VENUE").map_or(defaults.service_name, |venue| {
            service_name_for(&venue.trim().to_lowercase())
        });

        let log_level = set("LOG_LEVEL").unwrap_or(defaults.log_level);

        let format = match set("LOG_FORMAT") {
            Some(raw) => raw.parse()?,
            None => defaults.format,
        };

        let otel_enabled = match set("OTEL_ENABLED") {
            Some(raw) => match raw.trim().to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => true,
                "false" | "0" | "no" | "off" => false,
                _ => {
                    return Err(TracingError::invalid(
                        "OTEL_ENABLED",
                        &raw,
                        "expected true or false",
                    ));
                }
            },
            None => defaults.otel_enabled,
        };

        let otlp_endpoint = set("OTEL_EXPORTER_OTLP_ENDPOINT").unwrap_or(defaults.otlp_endpoint);

        Ok(Self {
            service_name,
            service_version: defaults.service_version,
            log_level,
            format,
            otel_enabled,
            otlp_endpoint,
        })
    }
}

/// Service name for a venue's worker.
#[must_use]
pub fn service_name_for(venue: &str) -> String {
    format!("executor-{venue}")
}

/// Error type for tracing operations.
#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    /// Logging variable could not be parsed.
    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Raw value.
        value: String,
        /// Why it was refused.
        reason: String,
    },
    /// Invalid log filter.
    #[error("invalid log filter '{filter}': {message}")]
    Filter {
        /// The rejected filter.
        filter: String,
        /// Parser message.
        message: String,
    },
    /// Failed to create OTLP exporter.
    #[error("failed to create OTLP exporter: {0}")]
    ExporterError(String),
    /// Failed to initialize tracing subscriber.
    #[error("failed to initialize tracing subscriber: {0}")]
    SubscriberError(String),
}

impl TracingError {
    fn invalid(key: &str, value: &str, reason: &str) -> Self {
        Self::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Guard that shuts down OpenTelemetry when dropped.
pub struct TracingGuard {
    provider: Option<SdkTracerProvider>,
}

impl Drop for TracingGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.provider.take()
            && let Err(e) = provider.shutdown()
        {
            eprintln!("Failed to shutdown OpenTelemetry tracer provider: {e}");
        }
    }
}

/// Build the level filter: `RUST_LOG` if set, otherwise the configured level.
fn build_filter(config: &TracingConfig) -> Result<EnvFilter, TracingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.log_level).map_err(|e| TracingError::Filter {
        filter: config.log_level.clone(),
        message: e.to_string(),
    })
}

fn fmt_layer(format: LogFormat) -> Box<dyn Layer<Registry> + Send + Sync> {
    match format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .boxed(),
    }
}

/// Initialize logging, and OTLP span export when enabled.
///
/// Returns a guard that must be kept alive for the duration of the program.
pub fn init_tracing(config: &TracingConfig) -> Result<TracingGuard, TracingError> {
    let env_filter = build_filter(config)?;

    let provider = if config.otel_enabled {
        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .with_endpoint(&config.otlp_endpoint)
            .build()
            .map_err(|e| TracingError::ExporterError(e.to_string()))?;

        let resource = Resource::builder()
            .with_attributes([
                KeyValue::new("service.name", config.service_name.clone()),
                KeyValue::new("service.version", config.service_version.clone()),
            ])
            .build();

        Some(
            SdkTracerProvider::builder()
                .with_resource(resource)
                .with_batch_exporter(exporter)
                .build(),
        )
    } else {
        None
    };

    let otel_layer = provider.as_ref().map(|p| {
        tracing_opentelemetry::layer().with_tracer(p.tracer(config.service_name.clone()))
    });

    tracing_subscriber::registry()
        .with(fmt_layer(config.format))
        .with(otel_layer)
        .with(env_filter)
        .try_init()
        .map_err(|e| TracingError::SubscriberError(e.to_string()))?;

    tracing::debug!(
        service = %config.service_name,
        otel_enabled = config.otel_enabled,
        "Tracing initialized"
    );

    Ok(TracingGuard { provider })
}
