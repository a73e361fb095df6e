//! In-memory simulated venue.
//!
//! Market orders fill immediately at the command's price (if any). Every
//! other order type rests open until cancelled. Nothing leaves the process.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;

use crate::application::ports::{
    CancelOrderRequest, CancelResult, CreateOrderRequest, ExchangeClient, ExchangeError,
    OrderResult, VenueOrderStatus,
};
use crate::domain::order_command::OrderType;
use crate::domain::shared::VenueOrderId;

#[derive(Debug, Clone)]
struct PaperOrder {
    result: OrderResult,
}

/// Simulated exchange keeping orders in memory.
#[derive(Debug, Default)]
pub struct PaperExchange {
    orders: Mutex<HashMap<VenueOrderId, PaperOrder>>,
    next_id: AtomicU64,
}

impl PaperExchange {
    /// Create an empty paper venue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state of an order, if known.
    #[must_use]
    pub fn order(&self, id: &VenueOrderId) -> Option<OrderResult> {
        self.orders.lock().get(id).map(|o| o.result.clone())
    }

    /// Number of orders still working.
    #[must_use]
    pub fn open_order_count(&self) -> usize {
        self.orders
            .lock()
            .values()
            .filter(|o| !o.result.status.is_closed())
            .count()
    }

    fn next_order_id(&self) -> VenueOrderId {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        VenueOrderId::new(format!("paper-{n}"))
    }
}

#[async_trait]
impl ExchangeClient for PaperExchange {
    fn venue(&self) -> &'static str {
        "paper"
    }

    async fn create_order(&self, request: CreateOrderRequest) -> Result<OrderResult, ExchangeError> {
        let order_id = self.next_order_id();

        let (status, filled_amount, average_price) = match request.order_type {
            OrderType::Market => (VenueOrderStatus::Filled, request.amount, request.price),
            _ => (VenueOrderStatus::Open, Decimal::ZERO, None),
        };

        let result = OrderResult {
            order_id: order_id.clone(),
            client_order_id: Some(request.client_order_id),
            symbol: request.symbol,
            status,
            filled_amount,
            average_price,
        };

        tracing::debug!(order_id = %order_id, status = %status, "Paper order accepted");

        self.orders.lock().insert(
            order_id,
            PaperOrder {
                result: result.clone(),
            },
        );

        Ok(result)
    }

    async fn cancel_order(&self, request: CancelOrderRequest) -> Result<CancelResult, ExchangeError> {
        let mut orders = self.orders.lock();
        let order = orders
            .get_mut(&request.id)
            .ok_or_else(|| ExchangeError::OrderNotFound {
                order_id: request.id.to_string(),
            })?;

        if let Some(symbol) = &request.symbol
            && *symbol != order.result.symbol
        {
            return Err(ExchangeError::OrderNotFound {
                order_id: request.id.to_string(),
            });
        }

        if order.result.status.is_closed() {
            return Err(ExchangeError::OrderRejected {
                reason: format!("order {} is already {}", request.id, order.result.status),
            });
        }

        order.result.status = VenueOrderStatus::Canceled;

        Ok(CancelResult {
            order_id: request.id,
            status: VenueOrderStatus::Canceled,
        })
    }
}
