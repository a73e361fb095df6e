//! Worker process wiring.
//!
//! One worker serves one (venue, queue) pair: build the venue client,
//! connect to RabbitMQ, declare the queue, consume until shutdown, close.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::application::ports::{ExchangeClient, ExchangeError, QueueError};
use crate::application::use_cases::{CommandConsumer, ConsumerReport, OrderDispatcher};
use crate::domain::consumer::{ConsumerLifecycle, ConsumerState};
use crate::domain::order_command::CommandValidator;
use crate::domain::shared::DomainError;
use crate::infrastructure::config::{ConfigError, ExecutorConfig};
use crate::infrastructure::exchange::build_exchange;
use crate::infrastructure::queue::RabbitMqTransport;

/// Fatal worker errors. Anything per-message never reaches this type.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    /// Configuration was missing or invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The venue client could not be built.
    #[error("failed to build exchange client: {0}")]
    Exchange(#[from] ExchangeError),
    /// The queue transport failed.
    #[error(transparent)]
    Queue(#[from] QueueError),
    /// Consumer lifecycle violated.
    #[error(transparent)]
    Lifecycle(#[from] DomainError),
}

/// Build the command consumer for a configured worker.
pub fn build_consumer<E>(exchange: Arc<E>, config: &ExecutorConfig) -> CommandConsumer<E>
where
    E: ExchangeClient,
{
    let dispatcher = OrderDispatcher::new(exchange).with_default_symbol(config.market.clone());
    CommandConsumer::new(
        Arc::new(CommandValidator::new()),
        dispatcher,
        config.ack_policy,
    )
}

/// A configured worker, ready to run.
#[derive(Debug)]
pub struct Worker {
    config: ExecutorConfig,
}

impl Worker {
    /// Create a worker from configuration.
    #[must_use]
    pub const fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    /// Run until `shutdown` fires or the transport fails.
    ///
    /// Connection and declaration failures are fatal. Once consuming, only
    /// a broken transport ends the run with an error.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<ConsumerReport, WorkerError> {
        let config = &self.config;
        let exchange = Arc::new(build_exchange(config.venue, &config.exchange)?);
        let consumer = build_consumer(exchange, config);

        let mut lifecycle = ConsumerLifecycle::new();
        lifecycle.transition(ConsumerState::Connecting)?;

        tracing::info!(
            venue = %config.venue,
            queue = %config.queue.name,
            amqp_addr = %config.amqp_addr_redacted(),
            "Connecting to RabbitMQ"
        );

        let transport =
            match RabbitMqTransport::connect(&config.amqp_addr, config.queue.clone()).await {
                Ok(transport) => transport,
                Err(error) => {
                    tracing::error!(error = %error, "Connection to RabbitMQ failed");
                    lifecycle.transition(ConsumerState::Disconnected)?;
                    return Err(error.into());
                }
            };

        if let Err(error) = transport.declare_queue().await {
            tracing::error!(error = %error, "Queue setup failed");
            close_quietly(&transport).await;
            lifecycle.transition(ConsumerState::Disconnected)?;
            return Err(error.into());
        }
        lifecycle.transition(ConsumerState::Ready)?;

        let forwarding = shutdown.child_token();
        let mut source = match transport.consume(config.ack_policy, forwarding.clone()).await {
            Ok(source) => source,
            Err(error) => {
                tracing::error!(error = %error, "Failed to start consuming");
                close_quietly(&transport).await;
                lifecycle.transition(ConsumerState::Disconnected)?;
                return Err(error.into());
            }
        };

        tracing::info!(queue = %config.queue.name, "Executor started");

        let result = consumer.run(&mut source, &mut lifecycle, &shutdown).await;

        forwarding.cancel();
        drop(source);
        close_quietly(&transport).await;
        lifecycle.transition(ConsumerState::Disconnected)?;

        Ok(result?)
    }
}

async fn close_quietly(transport: &RabbitMqTransport) {
    if let Err(error) = transport.close().await {
        tracing::warn!(error = %error, "Failed to close RabbitMQ connection cleanly");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::consumer::AckPolicy;
    use crate::infrastructure::exchange::PaperExchange;

    fn config(vars: &[(&str, &str)]) -> ExecutorConfig {
        let vars: Vec<(String, String)> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ExecutorConfig::from_lookup(|key| {
            vars.iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        })
        .unwrap()
    }

    #[tokio::test]
    async fn consumer_uses_configured_market_and_policy() {
        let config = config(&[
            ("API_KEY", "k"),
            ("API_SECRET", "s"),
            ("EXECUTOR_VENUE", "paper"),
            ("EXECUTOR_MARKET", "BTC/USD"),
            ("EXECUTOR_ACK_POLICY", "process_then_ack"),
        ]);
        let exchange = Arc::new(PaperExchange::new());
        let consumer = build_consumer(Arc::clone(&exchange), &config);

        assert_eq!(consumer.ack_policy(), AckPolicy::ProcessThenAck);
    }

    #[tokio::test]
    async fn unreachable_broker_is_fatal() {
        let config = config(&[
            ("API_KEY", "k"),
            ("API_SECRET", "s"),
            ("EXECUTOR_VENUE", "paper"),
            ("AMQP_ADDR", "amqp://127.0.0.1:1/%2f"),
        ]);
        let worker = Worker::new(config);

        let err = worker.run(CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, WorkerError::Queue(QueueError::Connection { .. })));
    }
}
