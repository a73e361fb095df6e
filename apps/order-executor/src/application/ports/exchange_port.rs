//! Exchange Port (Driven Port)
//!
//! Interface to a trading venue: place an order, cancel an order.

use std::fmt;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::order_command::{CancelOrderCommand, CreateOrderCommand, OrderSide, OrderType};
use crate::domain::shared::{ClientOrderId, Symbol, VenueOrderId};

/// Request to place an order on the venue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    /// Client order ID, lets the venue deduplicate resubmissions.
    pub client_order_id: ClientOrderId,
    /// Instrument to trade.
    pub symbol: Symbol,
    /// Order type.
    pub order_type: OrderType,
    /// Order side.
    pub side: OrderSide,
    /// Quantity.
    pub amount: Decimal,
    /// Limit price (stop trigger for plain stop orders).
    pub price: Option<Decimal>,
    /// Stop trigger for stop-limit orders.
    pub stop_price: Option<Decimal>,
}

impl CreateOrderRequest {
    /// Build a request from a validated command, with a fresh client order id.
    #[must_use]
    pub fn from_command(command: &CreateOrderCommand) -> Self {
        Self {
            client_order_id: ClientOrderId::generate(),
            symbol: command.symbol.clone(),
            order_type: command.order_type,
            side: command.side,
            amount: command.amount,
            price: command.price,
            stop_price: command.stop_price,
        }
    }
}

/// Request to cancel an order on the venue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelOrderRequest {
    /// Venue order id.
    pub id: VenueOrderId,
    /// Instrument, when the venue needs it to locate the order.
    pub symbol: Option<Symbol>,
}

impl CancelOrderRequest {
    /// Build a request from a validated command.
    ///
    /// `default_symbol` fills in a missing instrument (the worker's market).
    #[must_use]
    pub fn from_command(command: &CancelOrderCommand, default_symbol: Option<&Symbol>) -> Self {
        Self {
            id: command.id.clone(),
            symbol: command.symbol.clone().or_else(|| default_symbol.cloned()),
        }
    }
}

/// Order status as reported by the venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VenueOrderStatus {
    /// Accepted, not yet working.
    Pending,
    /// Working on the book.
    Open,
    /// Some quantity filled.
    PartiallyFilled,
    /// Fully filled.
    Filled,
    /// Cancel requested and accepted by the venue, not yet confirmed.
    PendingCancel,
    /// Cancelled.
    Canceled,
    /// Expired by time-in-force.
    Expired,
    /// Refused by the venue.
    Rejected,
}

impl VenueOrderStatus {
    /// Returns true once the order can no longer change.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(
            self,
            Self::Filled | Self::Canceled | Self::Expired | Self::Rejected
        )
    }
}

impl fmt::Display for VenueOrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Open => "open",
            Self::PartiallyFilled => "partially_filled",
            Self::Filled => "filled",
            Self::PendingCancel => "pending_cancel",
            Self::Canceled => "canceled",
            Self::Expired => "expired",
            Self::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

/// Venue acknowledgement of a placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderResult {
    /// Venue order id.
    pub order_id: VenueOrderId,
    /// Client order id echoed by the venue.
    pub client_order_id: Option<ClientOrderId>,
    /// Instrument.
    pub symbol: Symbol,
    /// Current status.
    pub status: VenueOrderStatus,
    /// Quantity filled so far.
    pub filled_amount: Decimal,
    /// Average fill price.
    pub average_price: Option<Decimal>,
}

/// Venue acknowledgement of a cancellation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelResult {
    /// Venue order id.
    pub order_id: VenueOrderId,
    /// Status after the cancel request.
    pub status: VenueOrderStatus,
}

/// Errors reported by a venue call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExchangeError {
    /// Venue unreachable or the request timed out.
    #[error("Network error: {message}")]
    Network {
        /// Error message.
        message: String,
    },

    /// Credentials were refused.
    #[error("Authentication failed: {message}")]
    Authentication {
        /// Error message.
        message: String,
    },

    /// The venue refused the order.
    #[error("Order rejected: {reason}")]
    OrderRejected {
        /// Rejection reason.
        reason: String,
    },

    /// No such order on the venue.
    #[error("Order not found: {order_id}")]
    OrderNotFound {
        /// The order ID that was not found.
        order_id: String,
    },

    /// Venue rate limit hit.
    #[error("Rate limited")]
    RateLimited {
        /// Suggested retry delay in seconds, if the venue gave one.
        retry_after_secs: Option<u64>,
    },

    /// The venue cannot express this request.
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// Error message.
        message: String,
    },

    /// Other venue-reported error.
    #[error("Venue error {code}: {message}")]
    Venue {
        /// Venue error code.
        code: String,
        /// Error message.
        message: String,
    },

    /// Anything else, including a panic inside the client.
    #[error("Unexpected error: {message}")]
    Unexpected {
        /// Error message.
        message: String,
    },
}

impl ExchangeError {
    /// Short kind name for logs and metric labels.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Network { .. } => "network",
            Self::Authentication { .. } => "authentication",
            Self::OrderRejected { .. } => "order_rejected",
            Self::OrderNotFound { .. } => "order_not_found",
            Self::RateLimited { .. } => "rate_limited",
            Self::InvalidRequest { .. } => "invalid_request",
            Self::Venue { .. } => "venue",
            Self::Unexpected { .. } => "unexpected",
        }
    }
}

/// Port for trading venue operations.
///
/// One call per command; implementations own their own rate limiting,
/// timeouts and authentication.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    /// Venue name for logs.
    fn venue(&self) -> &'static str;

    /// Place an order.
    async fn create_order(&self, request: CreateOrderRequest)
    -> Result<OrderResult, ExchangeError>;

    /// Cancel an order.
    async fn cancel_order(&self, request: CancelOrderRequest)
    -> Result<CancelResult, ExchangeError>;
}
