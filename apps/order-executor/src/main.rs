//! Order Executor Binary
//!
//! Starts one worker for the configured venue.
//!
//! # Usage
//!
//! ```bash
//! EXECUTOR_VENUE=alpaca API_KEY=... API_SECRET=... cargo run --bin order-executor
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `EXECUTOR_VENUE`: alpaca | paper
//! - `API_KEY`: Venue API key
//! - `API_SECRET`: Venue API secret
//!
//! ## Optional
//! - `AMQP_ADDR`: RabbitMQ address (default: amqp://127.0.0.1:5672/%2f)
//! - `EXECUTOR_MARKET`: Market traded by this worker, default symbol for cancels
//! - `EXECUTOR_QUEUE`: Queue name (default: venue name)
//! - `EXECUTOR_ACK_POLICY`: at_most_once | process_then_ack (default: at_most_once)
//! - `QUEUE_MESSAGE_TTL_MS`: Message TTL (default: 20000)
//! - `QUEUE_DURABLE`: Durable queue (default: false)
//! - `QUEUE_PREFETCH`: Prefetch under process_then_ack (default: 1)
//! - `ALPACA_ENV`: paper | live (default: paper)
//! - `EXCHANGE_TIMEOUT_MS`: Venue request timeout (default: 30000)
//! - `EXCHANGE_RATE_LIMIT_MS`: Minimum spacing between venue requests (default: 200)
//! - `METRICS_PORT`: Prometheus port (default: 0, disabled)
//! - `LOG_LEVEL`, `LOG_FORMAT`, `RUST_LOG`, `OTEL_ENABLED`, `OTEL_EXPORTER_OTLP_ENDPOINT`

use std::process::ExitCode;

use order_executor::observability::{MetricsConfig, TracingConfig, init_metrics, init_tracing};
use order_executor::{ExecutorConfig, StopReason, Worker};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

#[tokio::main]
async fn main() -> ExitCode {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("a rustls crypto provider was already installed");
    }

    load_dotenv();

    let tracing_config = match TracingConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("invalid logging configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    let _tracing_guard = match init_tracing(&tracing_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("failed to initialize logging: {e}");
            return ExitCode::FAILURE;
        }
    };

    let span = tracing::info_span!("service", service = %tracing_config.service_name);

    async move {
        let config = match ExecutorConfig::from_env() {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(error = %e, "Invalid configuration");
                return ExitCode::FAILURE;
            }
        };
        log_config(&config);

        if config.metrics_port != 0
            && let Err(e) = init_metrics(&MetricsConfig::with_port(config.metrics_port))
        {
            tracing::error!(error = %e, "Failed to start metrics exporter");
            return ExitCode::FAILURE;
        }

        let shutdown_token = CancellationToken::new();
        tokio::spawn(await_shutdown(shutdown_token.clone()));

        let worker = Worker::new(config);
        match worker.run(shutdown_token).await {
            Ok(report) => {
                tracing::info!(
                    received = report.stats.received,
                    reason = ?report.stop_reason,
                    "Executor stopped"
                );
                if report.stop_reason == StopReason::Shutdown {
                    ExitCode::SUCCESS
                } else {
                    ExitCode::FAILURE
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Executor failed");
                ExitCode::FAILURE
            }
        }
    }
    .instrument(span)
    .await
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Log the parsed configuration.
fn log_config(config: &ExecutorConfig) {
    tracing::info!(
        venue = %config.venue,
        queue = %config.queue.name,
        market = config.market.as_ref().map(|m| m.as_str()),
        ack_policy = %config.ack_policy,
        alpaca_environment = %config.exchange.alpaca_environment,
        metrics_port = config.metrics_port,
        "Configuration loaded"
    );
    tracing::debug!(
        durable = config.queue.durable,
        message_ttl_ms = config.queue.message_ttl_ms,
        prefetch = config.queue.prefetch,
        timeout_ms = config.exchange.timeout.as_millis(),
        min_request_interval_ms = config.exchange.min_request_interval.as_millis(),
        "Queue and venue settings"
    );
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, draining");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, draining");
        }
    }

    shutdown_token.cancel();
}
