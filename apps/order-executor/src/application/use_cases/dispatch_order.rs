//! Dispatch Order Use Case
//!
//! Turns one validated command into exactly one venue call and reports the
//! result. Failures never escape: they are logged and folded into the
//! returned [`ExecutionOutcome`].

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::Serialize;

use crate::application::ports::{
    CancelOrderRequest, CancelResult, CreateOrderRequest, ExchangeClient, ExchangeError,
    OrderResult,
};
use crate::domain::order_command::{Command, CommandRef};
use crate::domain::shared::Symbol;
use crate::observability::record_dispatch;

/// What the venue returned for a successful call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum VenueResult {
    /// Order placed.
    Created(OrderResult),
    /// Order cancelled.
    Canceled(CancelResult),
}

/// Result of dispatching one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    /// The command this outcome is for.
    pub command: CommandRef,
    /// Whether the venue call succeeded.
    pub success: bool,
    /// Venue response (if successful).
    pub venue_result: Option<VenueResult>,
    /// Error (if failed).
    pub error: Option<ExchangeError>,
    /// When the venue call finished.
    pub completed_at: DateTime<Utc>,
}

impl ExecutionOutcome {
    /// A successful outcome.
    #[must_use]
    pub fn succeeded(command: CommandRef, result: VenueResult) -> Self {
        Self {
            command,
            success: true,
            venue_result: Some(result),
            error: None,
            completed_at: Utc::now(),
        }
    }

    /// A failed outcome.
    #[must_use]
    pub fn failed(command: CommandRef, error: ExchangeError) -> Self {
        Self {
            command,
            success: false,
            venue_result: None,
            error: Some(error),
            completed_at: Utc::now(),
        }
    }
}

/// Dispatches validated commands to the exchange client.
pub struct OrderDispatcher<E>
where
    E: ExchangeClient,
{
    exchange: Arc<E>,
    default_symbol: Option<Symbol>,
}

impl<E> OrderDispatcher<E>
where
    E: ExchangeClient,
{
    /// Create a new dispatcher.
    pub const fn new(exchange: Arc<E>) -> Self {
        Self {
            exchange,
            default_symbol: None,
        }
    }

    /// Instrument forwarded with cancels that do not name one.
    #[must_use]
    pub fn with_default_symbol(mut self, symbol: Option<Symbol>) -> Self {
        self.default_symbol = symbol;
        self
    }

    /// Venue name of the underlying client.
    pub fn venue(&self) -> &'static str {
        self.exchange.venue()
    }

    /// Execute a command against the venue.
    ///
    /// Makes exactly one venue call. A panic inside the client is caught and
    /// reported as [`ExchangeError::Unexpected`].
    pub async fn dispatch(&self, command: Command) -> ExecutionOutcome {
        let reference = command.reference();
        let operation = command.operation();
        let venue = self.venue();
        let started = Instant::now();

        let call = async {
            match &command {
                Command::Create(create) => self
                    .exchange
                    .create_order(CreateOrderRequest::from_command(create))
                    .await
                    .map(VenueResult::Created),
                Command::Cancel(cancel) => self
                    .exchange
                    .cancel_order(CancelOrderRequest::from_command(
                        cancel,
                        self.default_symbol.as_ref(),
                    ))
                    .await
                    .map(VenueResult::Canceled),
            }
        };

        let result = match AssertUnwindSafe(call).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(ExchangeError::Unexpected {
                message: format!("exchange client panicked: {}", panic_message(&*panic)),
            }),
        };
        let latency = started.elapsed().as_secs_f64();

        match result {
            Ok(venue_result) => {
                record_dispatch(venue, operation.as_str(), "success", latency);
                log_success(venue, &reference, &venue_result);
                ExecutionOutcome::succeeded(reference, venue_result)
            }
            Err(error) => {
                record_dispatch(venue, operation.as_str(), error.kind(), latency);
                tracing::error!(
                    venue,
                    operation = %operation,
                    command = %reference,
                    error = %error,
                    error_kind = error.kind(),
                    "Command failed"
                );
                ExecutionOutcome::failed(reference, error)
            }
        }
    }
}

fn log_success(venue: &str, reference: &CommandRef, result: &VenueResult) {
    match result {
        VenueResult::Created(order) => tracing::info!(
            venue,
            operation = "create",
            symbol = %order.symbol,
            order_id = %order.order_id,
            status = %order.status,
            filled = %order.filled_amount,
            "Order created"
        ),
        VenueResult::Canceled(cancel) => tracing::info!(
            venue,
            operation = "cancel",
            command = %reference,
            order_id = %cancel.order_id,
            status = %cancel.status,
            "Order cancelled"
        ),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{MockExchangeClient, VenueOrderStatus};
    use crate::domain::order_command::{
        CancelOrderCommand, CreateOrderCommand, Operation, OrderSide, OrderType,
    };
    use crate::domain::shared::VenueOrderId;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn create_command() -> Command {
        Command::Create(CreateOrderCommand {
            symbol: Symbol::new_unchecked("BTC/USD"),
            order_type: OrderType::Limit,
            side: OrderSide::Buy,
            amount: dec!(0.01),
            price: Some(dec!(30000)),
            stop_price: None,
        })
    }

    fn cancel_command(symbol: Option<&str>) -> Command {
        Command::Cancel(CancelOrderCommand {
            id: VenueOrderId::new("abc123"),
            symbol: symbol.map(Symbol::new_unchecked),
        })
    }

    fn order_result(request: &CreateOrderRequest) -> OrderResult {
        OrderResult {
            order_id: VenueOrderId::new("venue-1"),
            client_order_id: Some(request.client_order_id.clone()),
            symbol: request.symbol.clone(),
            status: VenueOrderStatus::Open,
            filled_amount: Decimal::ZERO,
            average_price: None,
        }
    }

    #[tokio::test]
    async fn create_calls_create_order_once() {
        let mut exchange = MockExchangeClient::new();
        exchange.expect_venue().return_const("mock");
        exchange
            .expect_create_order()
            .withf(|request| {
                request.symbol.as_str() == "BTC/USD"
                    && request.order_type == OrderType::Limit
                    && request.side == OrderSide::Buy
                    && request.amount == dec!(0.01)
                    && request.price == Some(dec!(30000))
            })
            .times(1)
            .returning(|request| Ok(order_result(&request)));
        exchange.expect_cancel_order().never();

        let dispatcher = OrderDispatcher::new(Arc::new(exchange));
        let outcome = dispatcher.dispatch(create_command()).await;

        assert!(outcome.success);
        assert!(outcome.error.is_none());
        assert_eq!(outcome.command.operation(), Operation::Create);
        assert!(matches!(
            outcome.venue_result,
            Some(VenueResult::Created(ref order)) if order.order_id.as_str() == "venue-1"
        ));
    }

    #[tokio::test]
    async fn cancel_calls_cancel_order_once() {
        let mut exchange = MockExchangeClient::new();
        exchange.expect_venue().return_const("mock");
        exchange.expect_create_order().never();
        exchange
            .expect_cancel_order()
            .withf(|request| request.id.as_str() == "abc123")
            .times(1)
            .returning(|request| {
                Ok(CancelResult {
                    order_id: request.id,
                    status: VenueOrderStatus::Canceled,
                })
            });

        let dispatcher = OrderDispatcher::new(Arc::new(exchange));
        let outcome = dispatcher.dispatch(cancel_command(None)).await;

        assert!(outcome.success);
        assert_eq!(outcome.command.operation(), Operation::Cancel);
    }

    #[tokio::test]
    async fn cancel_uses_default_symbol() {
        let mut exchange = MockExchangeClient::new();
        exchange.expect_venue().return_const("mock");
        exchange
            .expect_cancel_order()
            .withf(|request| {
                request.symbol.as_ref().map(Symbol::as_str) == Some("BTC/USD")
            })
            .times(1)
            .returning(|request| {
                Ok(CancelResult {
                    order_id: request.id,
                    status: VenueOrderStatus::Canceled,
                })
            });

        let dispatcher = OrderDispatcher::new(Arc::new(exchange))
            .with_default_symbol(Some(Symbol::new_unchecked("BTC/USD")));
        assert!(dispatcher.dispatch(cancel_command(None)).await.success);
    }

    #[tokio::test]
    async fn venue_error_becomes_failed_outcome() {
        let mut exchange = MockExchangeClient::new();
        exchange.expect_venue().return_const("mock");
        exchange.expect_cancel_order().times(1).returning(|request| {
            Err(ExchangeError::OrderNotFound {
                order_id: request.id.into_inner(),
            })
        });

        let dispatcher = OrderDispatcher::new(Arc::new(exchange));
        let outcome = dispatcher.dispatch(cancel_command(None)).await;

        assert!(!outcome.success);
        assert!(outcome.venue_result.is_none());
        assert_eq!(
            outcome.error,
            Some(ExchangeError::OrderNotFound {
                order_id: "abc123".to_string()
            })
        );
    }

    struct PanickingExchange;

    #[async_trait]
    impl ExchangeClient for PanickingExchange {
        fn venue(&self) -> &'static str {
            "panicking"
        }

        async fn create_order(
            &self,
            _request: CreateOrderRequest,
        ) -> Result<OrderResult, ExchangeError> {
            panic!("venue client bug");
        }

        async fn cancel_order(
            &self,
            _request: CancelOrderRequest,
        ) -> Result<CancelResult, ExchangeError> {
            panic!("venue client bug");
        }
    }

    #[tokio::test]
    async fn panic_becomes_unexpected_error() {
        let dispatcher = OrderDispatcher::new(Arc::new(PanickingExchange));
        let outcome = dispatcher.dispatch(create_command()).await;

        assert!(!outcome.success);
        match outcome.error {
            Some(ExchangeError::Unexpected { message }) => {
                assert!(message.contains("venue client bug"));
            }
            other => panic!("expected unexpected error, got {other:?}"),
        }
    }
}
