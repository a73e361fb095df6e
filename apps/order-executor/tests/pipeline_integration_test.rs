//! Pipeline Integration Tests
//!
//! Drives the consume → validate → dispatch loop through an in-memory
//! message source, the way the RabbitMQ transport feeds it in production.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use order_executor::application::ports::{
    Acknowledger, CancelOrderRequest, CancelResult, CreateOrderRequest, OrderResult,
    VenueOrderStatus,
};
use order_executor::domain::order_command::CommandRef;
use order_executor::domain::shared::VenueOrderId;
use order_executor::{
    AckPolicy, CommandConsumer, CommandValidator, ConsumerLifecycle, ConsumerState,
    ExchangeClient, ExchangeError, ExecutorConfig, InboundMessage, MessageOutcome, OrderDispatcher,
    OrderSide, OrderType, PaperExchange, QueueError, StopReason, ValidationError, build_consumer,
};

// =============================================================================
// Test doubles
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Create(CreateOrderRequest),
    Cancel(CancelOrderRequest),
}

#[derive(Default)]
struct RecordingExchange {
    calls: Mutex<Vec<Call>>,
    cancel_error: Option<ExchangeError>,
}

impl RecordingExchange {
    fn failing_cancels(error: ExchangeError) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            cancel_error: Some(error),
        }
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ExchangeClient for RecordingExchange {
    fn venue(&self) -> &'static str {
        "recording"
    }

    async fn create_order(&self, request: CreateOrderRequest) -> Result<OrderResult, ExchangeError> {
        self.calls.lock().push(Call::Create(request.clone()));
        Ok(OrderResult {
            order_id: VenueOrderId::new("venue-1"),
            client_order_id: Some(request.client_order_id),
            symbol: request.symbol,
            status: VenueOrderStatus::Open,
            filled_amount: Decimal::ZERO,
            average_price: None,
        })
    }

    async fn cancel_order(&self, request: CancelOrderRequest) -> Result<CancelResult, ExchangeError> {
        self.calls.lock().push(Call::Cancel(request.clone()));
        match &self.cancel_error {
            Some(error) => Err(error.clone()),
            None => Ok(CancelResult {
                order_id: request.id,
                status: VenueOrderStatus::Canceled,
            }),
        }
    }
}

struct CountingAck(Arc<AtomicUsize>);

#[async_trait]
impl Acknowledger for CountingAck {
    async fn ack(&self) -> Result<(), QueueError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

const LIMIT_BUY: &str = r#"{"operation":"create","symbol":"BTC/USD","orderType":"limit","side":"buy","amount":0.5,"price":30000}"#;
const CANCEL: &str = r#"{"operation":"cancel","id":"abc123"}"#;
const NEGATIVE_AMOUNT: &str = r#"{"operation":"create","symbol":"BTC/USD","amount":-1}"#;
const NO_OPERATION: &str = r#"{"foo":"bar"}"#;

fn consumer(
    exchange: Arc<RecordingExchange>,
    ack_policy: AckPolicy,
) -> CommandConsumer<RecordingExchange> {
    CommandConsumer::new(
        Arc::new(CommandValidator::new()),
        OrderDispatcher::new(exchange),
        ack_policy,
    )
}

fn ready_lifecycle() -> ConsumerLifecycle {
    let mut lifecycle = ConsumerLifecycle::new();
    lifecycle.transition(ConsumerState::Connecting).unwrap();
    lifecycle.transition(ConsumerState::Ready).unwrap();
    lifecycle
}

async fn source_with(
    payloads: &[&str],
) -> mpsc::Receiver<Result<InboundMessage, QueueError>> {
    let (tx, rx) = mpsc::channel(payloads.len().max(1));
    for (tag, payload) in payloads.iter().enumerate() {
        tx.send(Ok(InboundMessage::new(tag as u64 + 1, payload.as_bytes())))
            .await
            .unwrap();
    }
    rx
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn limit_create_is_dispatched_once() {
    let exchange = Arc::new(RecordingExchange::default());
    let consumer = consumer(Arc::clone(&exchange), AckPolicy::default());

    let outcome = consumer.handle(LIMIT_BUY.as_bytes()).await;

    let MessageOutcome::Executed(execution) = outcome else {
        panic!("expected execution, got {outcome:?}");
    };
    assert!(execution.success);
    assert_eq!(execution.command.to_string(), "create limit buy BTC/USD");

    let calls = exchange.calls();
    assert_eq!(calls.len(), 1);
    let Call::Create(request) = &calls[0] else {
        panic!("expected create, got {:?}", calls[0]);
    };
    assert_eq!(request.symbol.as_str(), "BTC/USD");
    assert_eq!(request.order_type, OrderType::Limit);
    assert_eq!(request.side, OrderSide::Buy);
    assert_eq!(request.amount, dec!(0.5));
    assert_eq!(request.price, Some(dec!(30000)));
}

#[tokio::test]
async fn cancel_is_dispatched_with_id() {
    let exchange = Arc::new(RecordingExchange::default());
    let consumer = consumer(Arc::clone(&exchange), AckPolicy::default());

    let outcome = consumer.handle(CANCEL.as_bytes()).await;

    assert!(matches!(outcome, MessageOutcome::Executed(ref e) if e.success));
    assert_eq!(
        exchange.calls(),
        vec![Call::Cancel(CancelOrderRequest {
            id: VenueOrderId::new("abc123"),
            symbol: None,
        })]
    );
}

#[tokio::test]
async fn negative_amount_is_rejected_without_venue_call() {
    let exchange = Arc::new(RecordingExchange::default());
    let consumer = consumer(Arc::clone(&exchange), AckPolicy::default());

    let outcome = consumer.handle(NEGATIVE_AMOUNT.as_bytes()).await;

    let MessageOutcome::Rejected(ValidationError::SchemaViolation { violations }) = outcome else {
        panic!("expected schema violation, got {outcome:?}");
    };
    assert!(violations.iter().any(|v| v.path == "/amount"));
    assert!(exchange.calls().is_empty());
}

#[tokio::test]
async fn missing_operation_is_unknown() {
    let exchange = Arc::new(RecordingExchange::default());
    let consumer = consumer(Arc::clone(&exchange), AckPolicy::default());

    let outcome = consumer.handle(NO_OPERATION.as_bytes()).await;

    assert_eq!(
        outcome,
        MessageOutcome::Rejected(ValidationError::UnknownOperation { found: None })
    );
    assert!(exchange.calls().is_empty());
}

#[tokio::test]
async fn venue_timeout_does_not_stop_the_loop() {
    let exchange = Arc::new(RecordingExchange::failing_cancels(ExchangeError::Network {
        message: "request timed out".to_string(),
    }));
    let consumer = consumer(Arc::clone(&exchange), AckPolicy::default());
    let mut source = source_with(&[CANCEL, LIMIT_BUY]).await;
    let mut lifecycle = ready_lifecycle();

    // Both messages are queued and the sender is gone, so the run ends
    // once they are handled.
    let report = consumer
        .run(&mut source, &mut lifecycle, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.stop_reason, StopReason::SourceClosed);
    assert_eq!(report.stats.received, 2);
    assert_eq!(report.stats.failed, 1);
    assert_eq!(report.stats.succeeded, 1);
    assert_eq!(lifecycle.state(), ConsumerState::Consuming);

    let calls = exchange.calls();
    assert_eq!(calls.len(), 2);
    assert!(matches!(calls[0], Call::Cancel(_)));
    assert!(matches!(calls[1], Call::Create(_)));
}

// =============================================================================
// Properties
// =============================================================================

#[tokio::test]
async fn every_valid_command_dispatches_exactly_once_in_order() {
    let exchange = Arc::new(RecordingExchange::default());
    let consumer = consumer(Arc::clone(&exchange), AckPolicy::default());
    let payloads = [
        LIMIT_BUY,
        NO_OPERATION,
        CANCEL,
        "not json",
        NEGATIVE_AMOUNT,
        r#"{"operation":"create","symbol":"ETH/USD","orderType":"market","side":"sell","amount":2}"#,
        r#"{"operation":"refund","id":"abc"}"#,
    ];
    let mut source = source_with(&payloads).await;
    let mut lifecycle = ready_lifecycle();

    let report = consumer
        .run(&mut source, &mut lifecycle, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.stats.received, 7);
    assert_eq!(report.stats.accepted, 3);
    assert_eq!(report.stats.rejected, 4);

    let kinds: Vec<&str> = exchange
        .calls()
        .iter()
        .map(|call| match call {
            Call::Create(_) => "create",
            Call::Cancel(_) => "cancel",
        })
        .collect();
    assert_eq!(kinds, vec!["create", "cancel", "create"]);
}

#[test]
fn validator_is_stateless_across_messages() {
    let validator = CommandValidator::new();

    let first = validator.validate(LIMIT_BUY.as_bytes()).unwrap();
    let _ = validator.validate(NEGATIVE_AMOUNT.as_bytes());
    let second = validator.validate(LIMIT_BUY.as_bytes()).unwrap();

    assert_eq!(first, second);
    assert!(matches!(first.reference(), CommandRef::Create { .. }));
}

#[tokio::test]
async fn process_then_ack_acks_every_message_after_handling() {
    let exchange = Arc::new(RecordingExchange::failing_cancels(ExchangeError::OrderNotFound {
        order_id: "abc123".to_string(),
    }));
    let consumer = consumer(Arc::clone(&exchange), AckPolicy::ProcessThenAck);
    let acks = Arc::new(AtomicUsize::new(0));

    let (tx, mut rx) = mpsc::channel(3);
    for (tag, payload) in [LIMIT_BUY, CANCEL, NO_OPERATION].iter().enumerate() {
        let message = InboundMessage::new(tag as u64, payload.as_bytes())
            .with_acknowledger(Box::new(CountingAck(Arc::clone(&acks))));
        tx.send(Ok(message)).await.unwrap();
    }
    drop(tx);

    let mut lifecycle = ready_lifecycle();
    let report = consumer
        .run(&mut rx, &mut lifecycle, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.stats.received, 3);
    assert_eq!(acks.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn shutdown_stops_pulling_and_drains() {
    let exchange = Arc::new(RecordingExchange::default());
    let consumer = consumer(Arc::clone(&exchange), AckPolicy::default());
    let (tx, mut rx) = mpsc::channel::<Result<InboundMessage, QueueError>>(4);
    let mut lifecycle = ready_lifecycle();

    let shutdown = CancellationToken::new();
    shutdown.cancel();
    tx.send(Ok(InboundMessage::new(1, LIMIT_BUY.as_bytes())))
        .await
        .unwrap();

    let report = consumer
        .run(&mut rx, &mut lifecycle, &shutdown)
        .await
        .unwrap();

    assert_eq!(report.stop_reason, StopReason::Shutdown);
    assert_eq!(report.stats.received, 0);
    assert_eq!(lifecycle.state(), ConsumerState::Draining);
    assert!(exchange.calls().is_empty());
}

#[tokio::test]
async fn transport_failure_ends_the_run_with_error() {
    let exchange = Arc::new(RecordingExchange::default());
    let consumer = consumer(Arc::clone(&exchange), AckPolicy::default());
    let (tx, mut rx) = mpsc::channel(2);
    tx.send(Ok(InboundMessage::new(1, CANCEL.as_bytes())))
        .await
        .unwrap();
    tx.send(Err(QueueError::Closed)).await.unwrap();

    let mut lifecycle = ready_lifecycle();
    let err = consumer
        .run(&mut rx, &mut lifecycle, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err, QueueError::Closed);
    assert_eq!(exchange.calls().len(), 1);
}

// =============================================================================
// Paper venue end to end
// =============================================================================

#[tokio::test]
async fn paper_venue_places_and_cancels() {
    let config = ExecutorConfig::from_lookup(|key| {
        let value = match key {
            "API_KEY" => Some("key"),
            "API_SECRET" => Some("secret"),
            "EXECUTOR_VENUE" => Some("paper"),
            "EXECUTOR_MARKET" => Some("BTC/USD"),
            _ => None,
        };
        value.map(str::to_string)
    })
    .unwrap();

    let paper = Arc::new(PaperExchange::new());
    let consumer = build_consumer(Arc::clone(&paper), &config);

    let MessageOutcome::Executed(created) = consumer.handle(LIMIT_BUY.as_bytes()).await else {
        panic!("limit order should execute");
    };
    let order_id = match created.venue_result {
        Some(order_executor::application::use_cases::VenueResult::Created(result)) => {
            result.order_id
        }
        other => panic!("unexpected venue result {other:?}"),
    };
    assert_eq!(paper.open_order_count(), 1);

    let cancel = format!(r#"{{"operation":"cancel","id":"{order_id}"}}"#);
    let MessageOutcome::Executed(cancelled) = consumer.handle(cancel.as_bytes()).await else {
        panic!("cancel should execute");
    };
    assert!(cancelled.success);
    assert_eq!(paper.open_order_count(), 0);

    // Cancelling again reaches the venue and fails there.
    let MessageOutcome::Executed(again) = consumer.handle(cancel.as_bytes()).await else {
        panic!("cancel should execute");
    };
    assert!(!again.success);
    assert!(matches!(again.error, Some(ExchangeError::OrderRejected { .. })));
}
