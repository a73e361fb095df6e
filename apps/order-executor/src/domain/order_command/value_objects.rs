//! Order side and order type as they appear on the command wire.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Order side (buy or sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    /// Buy order.
    Buy,
    /// Sell order.
    Sell,
}

impl OrderSide {
    /// Parse a wire value; only the exact lowercase names are accepted.
    #[must_use]
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "buy" => Some(Self::Buy),
            "sell" => Some(Self::Sell),
            _ => None,
        }
    }

    /// Wire name of the side.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order type specifying execution behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    /// Market order - execute at best available price.
    Market,
    /// Limit order - execute at `price` or better.
    Limit,
    /// Stop order - becomes a market order once `price` trades.
    Stop,
    /// Stop-limit order - becomes a limit order at `price` once `stopPrice` trades.
    StopLimit,
}

impl OrderType {
    /// All accepted wire names, in schema order.
    pub const WIRE_NAMES: [&'static str; 4] = ["market", "limit", "stop", "stop_limit"];

    /// Parse a wire value; only the exact lowercase names are accepted.
    #[must_use]
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "market" => Some(Self::Market),
            "limit" => Some(Self::Limit),
            "stop" => Some(Self::Stop),
            "stop_limit" => Some(Self::StopLimit),
            _ => None,
        }
    }

    /// Wire name of the order type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Market => "market",
            Self::Limit => "limit",
            Self::Stop => "stop",
            Self::StopLimit => "stop_limit",
        }
    }

    /// Returns true if a non-null `price` must accompany this order type.
    #[must_use]
    pub const fn requires_price(&self) -> bool {
        !self.is_market()
    }

    /// Returns true if a `stopPrice` must accompany this order type.
    #[must_use]
    pub const fn requires_stop_price(&self) -> bool {
        matches!(self, Self::StopLimit)
    }

    /// Returns true if this is a market order (immediate execution).
    #[must_use]
    pub const fn is_market(&self) -> bool {
        matches!(self, Self::Market)
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
