//! Consume Commands Use Case
//!
//! The worker's main loop: pull one message, validate it, dispatch it,
//! apply the acknowledgement policy, then pull the next. A message that
//! fails at any stage is logged and dropped; the loop only ends on shutdown
//! or when the transport goes away.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::dispatch_order::{ExecutionOutcome, OrderDispatcher};
use crate::application::ports::{ExchangeClient, MessageSource, QueueError};
use crate::domain::consumer::{AckPolicy, ConsumerLifecycle, ConsumerState};
use crate::domain::order_command::{CommandValidator, ValidationError};
use crate::observability::{record_ack_failure, record_message_received, record_message_rejected};

/// Result of handling one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Dropped by validation; nothing was sent to the venue.
    Rejected(ValidationError),
    /// Dispatched to the venue.
    Executed(ExecutionOutcome),
}

/// Counters for one consumer run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    /// Messages pulled from the queue.
    pub received: u64,
    /// Messages that validated into commands.
    pub accepted: u64,
    /// Messages dropped by validation.
    pub rejected: u64,
    /// Venue calls that succeeded.
    pub succeeded: u64,
    /// Venue calls that failed.
    pub failed: u64,
}

impl ConsumerStats {
    fn record(&mut self, outcome: &MessageOutcome) {
        match outcome {
            MessageOutcome::Rejected(_) => self.rejected += 1,
            MessageOutcome::Executed(execution) => {
                self.accepted += 1;
                if execution.success {
                    self.succeeded += 1;
                } else {
                    self.failed += 1;
                }
            }
        }
    }
}

/// Why the consumer loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Shutdown was requested.
    Shutdown,
    /// The message source closed on its own.
    SourceClosed,
}

/// Summary of a finished consumer run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsumerReport {
    /// Message counters.
    pub stats: ConsumerStats,
    /// Why the loop ended.
    pub stop_reason: StopReason,
}

/// Sequential command consumer.
pub struct CommandConsumer<E>
where
    E: ExchangeClient,
{
    validator: Arc<CommandValidator>,
    dispatcher: OrderDispatcher<E>,
    ack_policy: AckPolicy,
}

impl<E> CommandConsumer<E>
where
    E: ExchangeClient,
{
    /// Create a new consumer.
    pub const fn new(
        validator: Arc<CommandValidator>,
        dispatcher: OrderDispatcher<E>,
        ack_policy: AckPolicy,
    ) -> Self {
        Self {
            validator,
            dispatcher,
            ack_policy,
        }
    }

    /// Acknowledgement policy in force.
    pub const fn ack_policy(&self) -> AckPolicy {
        self.ack_policy
    }

    /// Validate and dispatch one payload.
    pub async fn handle(&self, payload: &[u8]) -> MessageOutcome {
        match self.validator.validate(payload) {
            Ok(command) => MessageOutcome::Executed(self.dispatcher.dispatch(command).await),
            Err(error) => {
                let venue = self.dispatcher.venue();
                record_message_rejected(venue, error.kind());
                tracing::warn!(
                    venue,
                    error = %error,
                    error_kind = error.kind(),
                    payload_len = payload.len(),
                    "Rejected invalid message"
                );
                tracing::debug!(
                    payload = %String::from_utf8_lossy(payload),
                    "Rejected payload"
                );
                MessageOutcome::Rejected(error)
            }
        }
    }

    /// Consume until shutdown or until the source closes.
    ///
    /// Messages are handled strictly one after another. Once `shutdown`
    /// fires no new message is pulled; a message already being handled runs
    /// to completion first.
    pub async fn run<S>(
        &self,
        source: &mut S,
        lifecycle: &mut ConsumerLifecycle,
        shutdown: &CancellationToken,
    ) -> Result<ConsumerReport, QueueError>
    where
        S: MessageSource + ?Sized,
    {
        let venue = self.dispatcher.venue();
        lifecycle.transition(ConsumerState::Consuming)?;
        tracing::info!(venue, ack_policy = %self.ack_policy, "Consuming commands");

        let mut stats = ConsumerStats::default();

        let stop_reason = loop {
            let next = tokio::select! {
                biased;
                () = shutdown.cancelled() => break StopReason::Shutdown,
                next = source.next_message() => next,
            };

            let mut message = match next {
                None => break StopReason::SourceClosed,
                Some(Err(error)) => {
                    tracing::error!(venue, error = %error, "Message source failed");
                    return Err(error);
                }
                Some(Ok(message)) => message,
            };

            stats.received += 1;
            record_message_received(venue);
            let delivery_tag = message.delivery_tag;

            let outcome = {
                let handling = self.handle(&message.payload);
                tokio::pin!(handling);
                tokio::select! {
                    biased;
                    outcome = &mut handling => outcome,
                    () = shutdown.cancelled() => {
                        lifecycle.transition(ConsumerState::Draining)?;
                        tracing::info!(
                            venue,
                            delivery_tag,
                            "Shutdown requested, finishing in-flight message"
                        );
                        handling.await
                    }
                }
            };
            stats.record(&outcome);

            if self.ack_policy == AckPolicy::ProcessThenAck
                && let Err(error) = message.ack().await
            {
                record_ack_failure(venue);
                tracing::error!(venue, delivery_tag, error = %error, "Failed to acknowledge message");
            }
        };

        if stop_reason == StopReason::Shutdown && lifecycle.state() == ConsumerState::Consuming {
            lifecycle.transition(ConsumerState::Draining)?;
        }

        tracing::info!(
            venue,
            received = stats.received,
            accepted = stats.accepted,
            rejected = stats.rejected,
            succeeded = stats.succeeded,
            failed = stats.failed,
            reason = ?stop_reason,
            "Consumer stopped"
        );

        Ok(ConsumerReport { stats, stop_reason })
    }
}
