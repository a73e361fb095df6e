//! Validated trading commands.

use std::fmt;

use rust_decimal::Decimal;
use serde::Serialize;

use super::value_objects::{OrderSide, OrderType};
use crate::domain::shared::{Symbol, VenueOrderId};

/// The operation a command asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Place a new order.
    Create,
    /// Cancel an existing order.
    Cancel,
}

impl Operation {
    /// Parse the `operation` tag.
    #[must_use]
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "create" => Some(Self::Create),
            "cancel" => Some(Self::Cancel),
            _ => None,
        }
    }

    /// Wire name of the operation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Cancel => "cancel",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request to place a new order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateOrderCommand {
    /// Instrument to trade.
    pub symbol: Symbol,
    /// Order type.
    pub order_type: OrderType,
    /// Buy or sell.
    pub side: OrderSide,
    /// Quantity, always positive.
    pub amount: Decimal,
    /// Limit (or stop trigger) price; absent only for market orders.
    pub price: Option<Decimal>,
    /// Trigger price, present only for stop-limit orders.
    pub stop_price: Option<Decimal>,
}

/// Request to cancel an existing order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CancelOrderCommand {
    /// Venue identifier of the order.
    pub id: VenueOrderId,
    /// Instrument of the order, for venues that need it to locate orders.
    pub symbol: Option<Symbol>,
}

/// A validated trading command.
///
/// Only produced by the validator; immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "operation", rename_all = "lowercase")]
pub enum Command {
    /// Place a new order.
    Create(CreateOrderCommand),
    /// Cancel an existing order.
    Cancel(CancelOrderCommand),
}

impl Command {
    /// The operation this command performs.
    #[must_use]
    pub const fn operation(&self) -> Operation {
        match self {
            Self::Create(_) => Operation::Create,
            Self::Cancel(_) => Operation::Cancel,
        }
    }

    /// Identifying reference for logs and outcomes.
    #[must_use]
    pub fn reference(&self) -> CommandRef {
        match self {
            Self::Create(create) => CommandRef::Create {
                symbol: create.symbol.clone(),
                side: create.side,
                order_type: create.order_type,
            },
            Self::Cancel(cancel) => CommandRef::Cancel {
                id: cancel.id.clone(),
            },
        }
    }
}

/// What an outcome refers to: the symbol of a create or the id of a cancel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "operation", rename_all = "lowercase")]
pub enum CommandRef {
    /// A create command.
    Create {
        /// Instrument traded.
        symbol: Symbol,
        /// Side of the order.
        side: OrderSide,
        /// Type of the order.
        order_type: OrderType,
    },
    /// A cancel command.
    Cancel {
        /// Order being cancelled.
        id: VenueOrderId,
    },
}

impl CommandRef {
    /// The operation referred to.
    #[must_use]
    pub const fn operation(&self) -> Operation {
        match self {
            Self::Create { .. } => Operation::Create,
            Self::Cancel { .. } => Operation::Cancel,
        }
    }
}

impl fmt::Display for CommandRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create {
                symbol,
                side,
                order_type,
            } => write!(f, "create {order_type} {side} {symbol}"),
            Self::Cancel { id } => write!(f, "cancel {id}"),
        }
    }
}
