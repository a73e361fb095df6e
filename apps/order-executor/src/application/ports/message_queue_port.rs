//! Message Queue Port (Driver Port)
//!
//! How commands reach the application: a source of inbound messages, each
//! carrying an optional handle to acknowledge it to the broker.

use std::fmt;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::shared::DomainError;

/// Errors from the queue transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    /// Broker unreachable or the connection dropped.
    #[error("connection error: {message}")]
    Connection {
        /// Error message.
        message: String,
    },

    /// Channel or queue setup failed.
    #[error("failed to declare queue {queue}: {message}")]
    Declare {
        /// Queue name.
        queue: String,
        /// Error message.
        message: String,
    },

    /// Registering the consumer failed.
    #[error("failed to start consuming: {message}")]
    Consume {
        /// Error message.
        message: String,
    },

    /// Acknowledging a message failed.
    #[error("failed to acknowledge delivery {delivery_tag}: {message}")]
    Ack {
        /// Delivery tag.
        delivery_tag: u64,
        /// Error message.
        message: String,
    },

    /// The delivery stream ended without a shutdown request.
    #[error("message stream closed by the broker")]
    Closed,

    /// Consumer lifecycle violated.
    #[error(transparent)]
    Lifecycle(#[from] DomainError),
}

/// Handle that confirms a delivery to the broker.
#[async_trait]
pub trait Acknowledger: Send + Sync {
    /// Acknowledge the delivery.
    async fn ack(&self) -> Result<(), QueueError>;
}

/// A message pulled from the queue.
pub struct InboundMessage {
    /// Broker delivery tag.
    pub delivery_tag: u64,
    /// Raw payload bytes.
    pub payload: Vec<u8>,
    acknowledger: Option<Box<dyn Acknowledger>>,
}

impl InboundMessage {
    /// A message that needs no acknowledgement (auto-ack delivery).
    #[must_use]
    pub fn new(delivery_tag: u64, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            delivery_tag,
            payload: payload.into(),
            acknowledger: None,
        }
    }

    /// Attach the handle used to acknowledge this message.
    #[must_use]
    pub fn with_acknowledger(mut self, acknowledger: Box<dyn Acknowledger>) -> Self {
        self.acknowledger = Some(acknowledger);
        self
    }

    /// Whether the message carries an acknowledgement handle.
    #[must_use]
    pub fn needs_ack(&self) -> bool {
        self.acknowledger.is_some()
    }

    /// Acknowledge the message. Returns `false` if there was nothing to ack.
    pub async fn ack(&mut self) -> Result<bool, QueueError> {
        match self.acknowledger.take() {
            Some(acknowledger) => {
                acknowledger.ack().await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl fmt::Debug for InboundMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InboundMessage")
            .field("delivery_tag", &self.delivery_tag)
            .field("payload_len", &self.payload.len())
            .field("needs_ack", &self.needs_ack())
            .finish()
    }
}

/// Source of inbound messages, read one at a time.
#[async_trait]
pub trait MessageSource: Send {
    /// Next message, or `None` once the transport has closed.
    async fn next_message(&mut self) -> Option<Result<InboundMessage, QueueError>>;
}

#[async_trait]
impl MessageSource for mpsc::Receiver<Result<InboundMessage, QueueError>> {
    async fn next_message(&mut self) -> Option<Result<InboundMessage, QueueError>> {
        self.recv().await
    }
}
