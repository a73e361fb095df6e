//! Alpaca Markets exchange client
//!
//! `ExchangeClient` over Alpaca's trading REST API with:
//! - Client-side request spacing
//! - Retry logic with exponential backoff and jitter
//! - Environment-aware safety checks (PAPER vs LIVE)

mod adapter;
mod api_types;
mod config;
mod error;
mod http_client;

pub use adapter::AlpacaExchange;
pub use config::{AlpacaConfig, AlpacaEnvironment, RetryConfig, UnknownEnvironment};
pub use error::AlpacaError;
