//! Alpaca exchange client implementing `ExchangeClient`.

use async_trait::async_trait;

use crate::application::ports::{
    CancelOrderRequest, CancelResult, CreateOrderRequest, ExchangeClient, ExchangeError,
    OrderResult, VenueOrderStatus,
};
use crate::domain::order_command::OrderType;

use super::api_types::{AlpacaOrderRequest, AlpacaOrderResponse};
use super::config::{AlpacaConfig, AlpacaEnvironment};
use super::error::AlpacaError;
use super::http_client::AlpacaHttpClient;

/// Alpaca Markets trading client.
#[derive(Debug)]
pub struct AlpacaExchange {
    client: AlpacaHttpClient,
    environment: AlpacaEnvironment,
}

impl AlpacaExchange {
    /// Create a new Alpaca client.
    pub fn new(config: AlpacaConfig) -> Result<Self, AlpacaError> {
        let client = AlpacaHttpClient::new(&config)?;
        Ok(Self {
            client,
            environment: config.environment,
        })
    }

    /// Check if we're in live trading mode.
    #[must_use]
    pub const fn is_live(&self) -> bool {
        self.environment.is_live()
    }

    /// Convert `CreateOrderRequest` to Alpaca API format.
    ///
    /// Plain stop orders carry their trigger in `price`.
    fn to_alpaca_order_request(
        request: &CreateOrderRequest,
    ) -> Result<AlpacaOrderRequest, AlpacaError> {
        let missing = |field: &str| {
            AlpacaError::InvalidOrder(format!(
                "{} order requires {field}",
                request.order_type.as_str()
            ))
        };

        let (limit_price, stop_price) = match request.order_type {
            OrderType::Market => (None, None),
            OrderType::Limit => (Some(request.price.ok_or_else(|| missing("price"))?), None),
            OrderType::Stop => (None, Some(request.price.ok_or_else(|| missing("price"))?)),
            OrderType::StopLimit => (
                Some(request.price.ok_or_else(|| missing("price"))?),
                Some(request.stop_price.ok_or_else(|| missing("stopPrice"))?),
            ),
        };

        // Crypto pairs trade around the clock and reject "day".
        let time_in_force = if request.symbol.as_str().contains('/') {
            "gtc"
        } else {
            "day"
        };

        Ok(AlpacaOrderRequest {
            symbol: request.symbol.as_str().to_string(),
            qty: request.amount.normalize().to_string(),
            side: request.side.as_str().to_string(),
            order_type: request.order_type.as_str().to_string(),
            time_in_force: time_in_force.to_string(),
            limit_price: limit_price.map(|p| p.normalize().to_string()),
            stop_price: stop_price.map(|p| p.normalize().to_string()),
            client_order_id: request.client_order_id.as_str().to_string(),
        })
    }
}

#[async_trait]
impl ExchangeClient for AlpacaExchange {
    fn venue(&self) -> &'static str {
        "alpaca"
    }

    async fn create_order(&self, request: CreateOrderRequest) -> Result<OrderResult, ExchangeError> {
        if self.is_live() {
            tracing::warn!(
                client_order_id = %request.client_order_id,
                symbol = %request.symbol,
                "Submitting LIVE order - this will execute real trades"
            );
        }

        let alpaca_request = Self::to_alpaca_order_request(&request)?;

        tracing::debug!(
            client_order_id = %request.client_order_id,
            symbol = %request.symbol,
            side = %alpaca_request.side,
            order_type = %alpaca_request.order_type,
            qty = %alpaca_request.qty,
            limit_price = ?alpaca_request.limit_price,
            stop_price = ?alpaca_request.stop_price,
            "Submitting order to Alpaca"
        );

        let response: AlpacaOrderResponse = self.client.post("/v2/orders", &alpaca_request).await?;

        Ok(response.to_order_result())
    }

    async fn cancel_order(&self, request: CancelOrderRequest) -> Result<CancelResult, ExchangeError> {
        tracing::debug!(order_id = %request.id, "Canceling order on Alpaca");

        self.client
            .delete(&format!("/v2/orders/{}", request.id.as_str()))
            .await?;

        // A 204 only means Alpaca accepted the request; the order is closed
        // asynchronously.
        Ok(CancelResult {
            order_id: request.id,
            status: VenueOrderStatus::PendingCancel,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rust_decimal_macros::dec;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::domain::order_command::OrderSide;
    use crate::domain::shared::{ClientOrderId, Symbol, VenueOrderId};
    use crate::infrastructure::exchange::alpaca::RetryConfig;

    fn request(symbol: &str, order_type: OrderType) -> CreateOrderRequest {
        CreateOrderRequest {
            client_order_id: ClientOrderId::new("client-1"),
            symbol: Symbol::new_unchecked(symbol),
            order_type,
            side: OrderSide::Buy,
            amount: dec!(0.50),
            price: None,
            stop_price: None,
        }
    }

    fn exchange(server: &MockServer, retry: RetryConfig) -> AlpacaExchange {
        let config = AlpacaConfig::new(
            "key".to_string(),
            "secret".to_string(),
            AlpacaEnvironment::Paper,
        )
        .with_base_url(server.uri())
        .with_min_request_interval(Duration::ZERO)
        .with_retry(retry);
        AlpacaExchange::new(config).unwrap()
    }

    #[test]
    fn market_order_has_no_prices() {
        let alpaca = AlpacaExchange::to_alpaca_order_request(&request("AAPL", OrderType::Market))
            .unwrap();

        assert_eq!(alpaca.symbol, "AAPL");
        assert_eq!(alpaca.side, "buy");
        assert_eq!(alpaca.order_type, "market");
        assert_eq!(alpaca.time_in_force, "day");
        assert_eq!(alpaca.qty, "0.5");
        assert!(alpaca.limit_price.is_none());
        assert!(alpaca.stop_price.is_none());
    }

    #[test]
    fn crypto_pairs_use_gtc() {
        let mut req = request("BTC/USD", OrderType::Limit);
        req.price = Some(dec!(43000));

        let alpaca = AlpacaExchange::to_alpaca_order_request(&req).unwrap();
        assert_eq!(alpaca.time_in_force, "gtc");
        assert_eq!(alpaca.limit_price.as_deref(), Some("43000"));
    }

    #[test]
    fn stop_order_uses_price_as_trigger() {
        let mut req = request("AAPL", OrderType::Stop);
        req.price = Some(dec!(180.25));

        let alpaca = AlpacaExchange::to_alpaca_order_request(&req).unwrap();
        assert_eq!(alpaca.order_type, "stop");
        assert!(alpaca.limit_price.is_none());
        assert_eq!(alpaca.stop_price.as_deref(), Some("180.25"));
    }

    #[test]
    fn stop_limit_needs_both_prices() {
        let mut req = request("AAPL", OrderType::StopLimit);
        req.price = Some(dec!(181));
        assert!(matches!(
            AlpacaExchange::to_alpaca_order_request(&req),
            Err(AlpacaError::InvalidOrder(_))
        ));

        req.stop_price = Some(dec!(180));
        let alpaca = AlpacaExchange::to_alpaca_order_request(&req).unwrap();
        assert_eq!(alpaca.limit_price.as_deref(), Some("181"));
        assert_eq!(alpaca.stop_price.as_deref(), Some("180"));
    }

    #[tokio::test]
    async fn create_order_posts_and_maps_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/orders"))
            .and(header("APCA-API-KEY-ID", "key"))
            .and(header("APCA-API-SECRET-KEY", "secret"))
            .and(body_partial_json(json!({
                "symbol": "AAPL",
                "type": "market",
                "client_order_id": "client-1"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "venue-1",
                "client_order_id": "client-1",
                "symbol": "AAPL",
                "filled_qty": "0",
                "status": "accepted"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let exchange = exchange(&server, RetryConfig::disabled());
        let result = exchange
            .create_order(request("AAPL", OrderType::Market))
            .await
            .unwrap();

        assert_eq!(result.order_id, VenueOrderId::new("venue-1"));
        assert_eq!(result.status, VenueOrderStatus::Open);
    }

    #[tokio::test]
    async fn invalid_order_is_not_sent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let exchange = exchange(&server, RetryConfig::disabled());
        let err = exchange
            .create_order(request("AAPL", OrderType::Limit))
            .await
            .unwrap_err();

        assert!(matches!(err, ExchangeError::InvalidRequest { .. }));
    }

    #[tokio::test]
    async fn unprocessable_order_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/orders"))
            .respond_with(ResponseTemplate::new(422).set_body_json(json!({
                "code": 40010001,
                "message": "qty must be > 0"
            })))
            .mount(&server)
            .await;

        let exchange = exchange(&server, RetryConfig::disabled());
        let err = exchange
            .create_order(request("AAPL", OrderType::Market))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ExchangeError::OrderRejected {
                reason: "qty must be > 0".to_string()
            }
        );
    }

    #[tokio::test]
    async fn server_errors_are_retried_then_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/orders"))
            .respond_with(ResponseTemplate::new(503))
            .expect(2)
            .mount(&server)
            .await;

        let retry = RetryConfig {
            max_attempts: 2,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
            multiplier: 2.0,
        };
        let exchange = exchange(&server, retry);
        let err = exchange
            .create_order(request("AAPL", OrderType::Market))
            .await
            .unwrap_err();

        assert!(matches!(err, ExchangeError::Network { .. }));
    }

    #[tokio::test]
    async fn unauthorized_maps_to_authentication() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "message": "forbidden"
            })))
            .mount(&server)
            .await;

        let exchange = exchange(&server, RetryConfig::disabled());
        let err = exchange
            .create_order(request("AAPL", OrderType::Market))
            .await
            .unwrap_err();

        assert!(matches!(err, ExchangeError::Authentication { .. }));
    }

    #[tokio::test]
    async fn cancel_order_deletes_by_id() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/v2/orders/venue-1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let exchange = exchange(&server, RetryConfig::disabled());
        let result = exchange
            .cancel_order(CancelOrderRequest {
                id: VenueOrderId::new("venue-1"),
                symbol: None,
            })
            .await
            .unwrap();

        assert_eq!(result.order_id.as_str(), "venue-1");
        assert_eq!(result.status, VenueOrderStatus::PendingCancel);
        assert!(!result.status.is_closed());
    }

    #[tokio::test]
    async fn cancel_unknown_order_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/v2/orders/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "code": 40410000,
                "message": "order not found"
            })))
            .mount(&server)
            .await;

        let exchange = exchange(&server, RetryConfig::disabled());
        let err = exchange
            .cancel_order(CancelOrderRequest {
                id: VenueOrderId::new("missing"),
                symbol: None,
            })
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ExchangeError::OrderNotFound {
                order_id: "missing".to_string()
            }
        );
    }
}
