//! RabbitMQ transport over lapin.
//!
//! Connects, declares the venue's queue and turns the lapin consumer into a
//! bounded channel of [`InboundMessage`]s that the command consumer reads
//! one at a time.

use async_trait::async_trait;
use futures::StreamExt;
use lapin::acker::Acker;
use lapin::options::{BasicAckOptions, BasicConsumeOptions, BasicQosOptions, QueueDeclareOptions};
use lapin::types::{AMQPValue, FieldTable};
use lapin::{Channel, Connection, ConnectionProperties, Consumer};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{Acknowledger, InboundMessage, QueueError};
use crate::domain::consumer::AckPolicy;
use crate::infrastructure::config::QueueSettings;

/// Queue argument carrying the per-message TTL.
const MESSAGE_TTL_ARG: &str = "x-message-ttl";

/// Open AMQP connection with one channel bound to the worker's queue.
pub struct RabbitMqTransport {
    connection: Connection,
    channel: Channel,
    settings: QueueSettings,
}

impl std::fmt::Debug for RabbitMqTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RabbitMqTransport")
            .field("queue", &self.settings.name)
            .field("connected", &self.connection.status().connected())
            .finish_non_exhaustive()
    }
}

impl RabbitMqTransport {
    /// Connect to the broker and open a channel.
    pub async fn connect(addr: &str, settings: QueueSettings) -> Result<Self, QueueError> {
        let connection = Connection::connect(addr, ConnectionProperties::default())
            .await
            .map_err(|e| QueueError::Connection {
                message: e.to_string(),
            })?;

        let channel = connection
            .create_channel()
            .await
            .map_err(|e| QueueError::Connection {
                message: format!("failed to open channel: {e}"),
            })?;

        tracing::info!(queue = %settings.name, "Connected to RabbitMQ");

        Ok(Self {
            connection,
            channel,
            settings,
        })
    }

    /// Declare the queue with its TTL argument.
    pub async fn declare_queue(&self) -> Result<(), QueueError> {
        let declare_error = |message: String| QueueError::Declare {
            queue: self.settings.name.clone(),
            message,
        };

        let arguments = queue_arguments(&self.settings).map_err(declare_error)?;

        self.channel
            .queue_declare(
                &self.settings.name,
                QueueDeclareOptions {
                    durable: self.settings.durable,
                    auto_delete: self.settings.auto_delete,
                    ..QueueDeclareOptions::default()
                },
                arguments,
            )
            .await
            .map_err(|e| declare_error(e.to_string()))?;

        tracing::info!(
            queue = %self.settings.name,
            durable = self.settings.durable,
            message_ttl_ms = self.settings.message_ttl_ms,
            "Declared queue"
        );
        Ok(())
    }

    /// Start consuming.
    ///
    /// Deliveries are forwarded to the returned receiver until `shutdown`
    /// fires or the broker ends the stream. A broker-side end is reported
    /// as [`QueueError::Closed`].
    pub async fn consume(
        &self,
        ack_policy: AckPolicy,
        shutdown: CancellationToken,
    ) -> Result<mpsc::Receiver<Result<InboundMessage, QueueError>>, QueueError> {
        let consume_error = |e: lapin::Error| QueueError::Consume {
            message: e.to_string(),
        };

        if !ack_policy.auto_ack() {
            self.channel
                .basic_qos(self.settings.prefetch, BasicQosOptions::default())
                .await
                .map_err(consume_error)?;
        }

        let consumer_tag = format!("executor-{}", self.settings.name);
        let consumer = self
            .channel
            .basic_consume(
                &self.settings.name,
                &consumer_tag,
                consume_options(ack_policy),
                FieldTable::default(),
            )
            .await
            .map_err(consume_error)?;

        tracing::info!(
            queue = %self.settings.name,
            consumer_tag = %consumer_tag,
            ack_policy = ack_policy.as_str(),
            "Consuming"
        );

        let capacity = usize::from(self.settings.prefetch.max(1));
        let (tx, rx) = mpsc::channel(capacity);
        tokio::spawn(forward_deliveries(consumer, ack_policy, tx, shutdown));
        Ok(rx)
    }

    /// Close the channel and the connection.
    pub async fn close(&self) -> Result<(), QueueError> {
        let close_error = |e: lapin::Error| QueueError::Connection {
            message: e.to_string(),
        };
        if self.channel.status().connected() {
            self.channel.close(200, "OK").await.map_err(close_error)?;
        }
        if self.connection.status().connected() {
            self.connection.close(200, "OK").await.map_err(close_error)?;
        }
        tracing::info!(queue = %self.settings.name, "Closed RabbitMQ connection");
        Ok(())
    }
}

async fn forward_deliveries(
    mut consumer: Consumer,
    ack_policy: AckPolicy,
    tx: mpsc::Sender<Result<InboundMessage, QueueError>>,
    shutdown: CancellationToken,
) {
    loop {
        let next = tokio::select! {
            biased;
            () = shutdown.cancelled() => break,
            next = consumer.next() => next,
        };

        let item = match next {
            Some(Ok(delivery)) => {
                let mut message = InboundMessage::new(delivery.delivery_tag, delivery.data);
                if !ack_policy.auto_ack() {
                    message = message.with_acknowledger(Box::new(LapinAcknowledger {
                        acker: delivery.acker,
                        delivery_tag: delivery.delivery_tag,
                    }));
                }
                Ok(message)
            }
            Some(Err(e)) => Err(QueueError::Connection {
                message: e.to_string(),
            }),
            None => Err(QueueError::Closed),
        };

        let terminal = item.is_err();
        // Receiver gone means the consumer loop has stopped.
        if tx.send(item).await.is_err() || terminal {
            break;
        }
    }
    tracing::debug!("Delivery forwarding stopped");
}

/// Acks one delivery through lapin.
struct LapinAcknowledger {
    acker: Acker,
    delivery_tag: u64,
}

#[async_trait]
impl Acknowledger for LapinAcknowledger {
    async fn ack(&self) -> Result<(), QueueError> {
        self.acker
            .ack(BasicAckOptions::default())
            .await
            .map_err(|e| QueueError::Ack {
                delivery_tag: self.delivery_tag,
                message: e.to_string(),
            })
    }
}

fn queue_arguments(settings: &QueueSettings) -> Result<FieldTable, String> {
    let ttl = i32::try_from(settings.message_ttl_ms)
        .map_err(|_| format!("message TTL {} ms is out of range", settings.message_ttl_ms))?;

    let mut arguments = FieldTable::default();
    arguments.insert(MESSAGE_TTL_ARG.into(), AMQPValue::LongInt(ttl));
    Ok(arguments)
}

fn consume_options(ack_policy: AckPolicy) -> BasicConsumeOptions {
    BasicConsumeOptions {
        no_ack: ack_policy.auto_ack(),
        ..BasicConsumeOptions::default()
    }
}
