//! Alpaca API request and response types.
//!
//! These types map directly to Alpaca's REST API format.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::application::ports::{OrderResult, VenueOrderStatus};
use crate::domain::shared::{ClientOrderId, Symbol, VenueOrderId};

/// Order request for `POST /v2/orders`.
#[derive(Debug, Clone, Serialize)]
pub struct AlpacaOrderRequest {
    /// Symbol, `BTC/USD` style for crypto.
    pub symbol: String,
    /// Quantity.
    pub qty: String,
    /// Order side.
    pub side: String,
    /// Order type.
    #[serde(rename = "type")]
    pub order_type: String,
    /// Time in force.
    pub time_in_force: String,
    /// Limit price.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_price: Option<String>,
    /// Stop price.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_price: Option<String>,
    /// Client order ID.
    pub client_order_id: String,
}

/// Order response from Alpaca API.
#[derive(Debug, Clone, Deserialize)]
pub struct AlpacaOrderResponse {
    /// Venue order ID.
    pub id: String,
    /// Client order ID.
    #[serde(default)]
    pub client_order_id: Option<String>,
    /// Symbol.
    pub symbol: String,
    /// Filled quantity (as string).
    #[serde(default)]
    pub filled_qty: Option<String>,
    /// Average fill price (as string).
    #[serde(default)]
    pub filled_avg_price: Option<String>,
    /// Order status.
    pub status: String,
}

impl AlpacaOrderResponse {
    /// Convert to the port's `OrderResult`.
    #[must_use]
    pub fn to_order_result(&self) -> OrderResult {
        OrderResult {
            order_id: VenueOrderId::new(&self.id),
            client_order_id: self.client_order_id.as_deref().map(ClientOrderId::from),
            symbol: Symbol::new_unchecked(&self.symbol),
            status: parse_order_status(&self.status),
            filled_amount: self
                .filled_qty
                .as_deref()
                .and_then(|q| q.parse().ok())
                .unwrap_or(Decimal::ZERO),
            average_price: self.filled_avg_price.as_deref().and_then(|p| p.parse().ok()),
        }
    }
}

/// Error response from Alpaca API.
///
/// Alpaca sends `code` as a number; some proxies send a string.
#[derive(Debug, Clone, Deserialize)]
pub struct AlpacaErrorResponse {
    /// Error code.
    #[serde(default)]
    pub code: Option<serde_json::Value>,
    /// Error message.
    #[serde(default)]
    pub message: String,
}

impl AlpacaErrorResponse {
    /// Error code rendered as text, if present.
    #[must_use]
    pub fn code_string(&self) -> Option<String> {
        match self.code.as_ref()? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

/// Map an Alpaca order status string to `VenueOrderStatus`.
pub(super) fn parse_order_status(status: &str) -> VenueOrderStatus {
    match status.to_lowercase().as_str() {
        "new" | "accepted" | "replaced" | "pending_replace" | "held" => VenueOrderStatus::Open,
        "partially_filled" => VenueOrderStatus::PartiallyFilled,
        "filled" => VenueOrderStatus::Filled,
        "done_for_day" | "expired" => VenueOrderStatus::Expired,
        "pending_cancel" => VenueOrderStatus::PendingCancel,
        "canceled" => VenueOrderStatus::Canceled,
        "rejected" => VenueOrderStatus::Rejected,
        // pending_new, accepted_for_bidding, stopped, suspended, calculated, unknown
        _ => VenueOrderStatus::Pending,
    }
}
