//! Venue selection.
//!
//! Each supported venue is an enum variant with a concrete client behind it,
//! so an unknown venue name fails at config time instead of at first use.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;

use crate::application::ports::{
    CancelOrderRequest, CancelResult, CreateOrderRequest, ExchangeClient, ExchangeError,
    OrderResult,
};
use crate::infrastructure::config::ExchangeSettings;

use super::alpaca::{AlpacaConfig, AlpacaExchange};
use super::paper::PaperExchange;

/// Supported trading venues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Venue {
    /// Alpaca Markets (stocks and crypto).
    Alpaca,
    /// In-process simulator.
    Paper,
}

impl Venue {
    /// Every supported venue.
    pub const ALL: [Self; 2] = [Self::Alpaca, Self::Paper];

    /// Venue name as used in config and queue names.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Alpaca => "alpaca",
            Self::Paper => "paper",
        }
    }
}

impl fmt::Display for Venue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Venue name not in [`Venue::ALL`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported venue '{0}' (expected one of: alpaca, paper)")]
pub struct UnsupportedVenue(pub String);

impl FromStr for Venue {
    type Err = UnsupportedVenue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnsupportedVenue(s.to_string()))
    }
}

/// A constructed client for one venue.
#[derive(Debug)]
pub enum VenueClient {
    /// Alpaca REST client.
    Alpaca(AlpacaExchange),
    /// Paper simulator.
    Paper(PaperExchange),
}

/// Build the client for `venue`.
pub fn build_exchange(venue: Venue, settings: &ExchangeSettings) -> Result<VenueClient, ExchangeError> {
    match venue {
        Venue::Alpaca => {
            let config = AlpacaConfig::new(
                settings.credentials.api_key().to_string(),
                settings.credentials.api_secret().to_string(),
                settings.alpaca_environment,
            )
            .with_timeout(settings.timeout)
            .with_min_request_interval(settings.min_request_interval);
            Ok(VenueClient::Alpaca(AlpacaExchange::new(config)?))
        }
        Venue::Paper => Ok(VenueClient::Paper(PaperExchange::new())),
    }
}

#[async_trait]
impl ExchangeClient for VenueClient {
    fn venue(&self) -> &'static str {
        match self {
            Self::Alpaca(client) => client.venue(),
            Self::Paper(client) => client.venue(),
        }
    }

    async fn create_order(&self, request: CreateOrderRequest) -> Result<OrderResult, ExchangeError> {
        match self {
            Self::Alpaca(client) => client.create_order(request).await,
            Self::Paper(client) => client.create_order(request).await,
        }
    }

    async fn cancel_order(&self, request: CancelOrderRequest) -> Result<CancelResult, ExchangeError> {
        match self {
            Self::Alpaca(client) => client.cancel_order(request).await,
            Self::Paper(client) => client.cancel_order(request).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use test_case::test_case;

    use super::*;
    use crate::infrastructure::config::Credentials;
    use crate::infrastructure::exchange::alpaca::AlpacaEnvironment;

    fn settings(key: &str) -> ExchangeSettings {
        ExchangeSettings {
            credentials: Credentials::new(key.to_string(), "secret".to_string()),
            alpaca_environment: AlpacaEnvironment::Paper,
            timeout: Duration::from_secs(30),
            min_request_interval: Duration::from_millis(200),
        }
    }

    #[test_case("alpaca", Venue::Alpaca)]
    #[test_case("ALPACA", Venue::Alpaca)]
    #[test_case(" paper ", Venue::Paper)]
    fn parses_known_venues(raw: &str, expected: Venue) {
        assert_eq!(raw.parse::<Venue>(), Ok(expected));
    }

    #[test]
    fn rejects_unknown_venue() {
        let err = "binance".parse::<Venue>().unwrap_err();
        assert_eq!(err, UnsupportedVenue("binance".to_string()));
        assert!(err.to_string().contains("alpaca, paper"));
    }

    #[test]
    fn factory_builds_each_venue() {
        for venue in Venue::ALL {
            let client = build_exchange(venue, &settings("key")).unwrap();
            assert_eq!(client.venue(), venue.as_str());
        }
    }

    #[test]
    fn alpaca_without_key_fails_to_build() {
        let err = build_exchange(Venue::Alpaca, &settings("")).unwrap_err();
        assert!(matches!(err, ExchangeError::Authentication { .. }));
    }
}
