//! Alpaca-specific error types.

use thiserror::Error;

use crate::application::ports::ExchangeError;

/// Errors from the Alpaca adapter.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AlpacaError {
    /// HTTP client could not be built or the method is unsupported.
    #[error("HTTP error: {0}")]
    Http(String),

    /// API returned an error.
    #[error("API error: {code} - {message}")]
    Api {
        /// Error code from the API.
        code: String,
        /// Error message from the API.
        message: String,
    },

    /// Order was rejected.
    #[error("Order rejected: {0}")]
    OrderRejected(String),

    /// Authentication failed.
    #[error("Authentication failed")]
    AuthenticationFailed,

    /// Rate limited.
    #[error("Rate limited, retry after {retry_after_secs}s")]
    RateLimited {
        /// Suggested retry delay in seconds.
        retry_after_secs: u64,
    },

    /// Network error (retryable).
    #[error("Network error: {0}")]
    Network(String),

    /// JSON parsing error.
    #[error("JSON parsing error: {0}")]
    JsonParse(String),

    /// Max retries exceeded.
    #[error("Max retries exceeded after {attempts} attempts")]
    MaxRetriesExceeded {
        /// Number of attempts made before giving up.
        attempts: u32,
    },

    /// The request cannot be expressed in Alpaca's API.
    #[error("Invalid order: {0}")]
    InvalidOrder(String),

    /// Order not found.
    #[error("Order not found: {order_id}")]
    OrderNotFound {
        /// The order ID that was not found.
        order_id: String,
    },
}

impl From<AlpacaError> for ExchangeError {
    fn from(err: AlpacaError) -> Self {
        match err {
            AlpacaError::Network(message) => Self::Network { message },
            AlpacaError::MaxRetriesExceeded { attempts } => Self::Network {
                message: format!("Max retries exceeded after {attempts} attempts"),
            },
            AlpacaError::Http(message) | AlpacaError::JsonParse(message) => {
                Self::Unexpected { message }
            }
            AlpacaError::Api { code, message } => Self::Venue { code, message },
            AlpacaError::OrderRejected(reason) => Self::OrderRejected { reason },
            AlpacaError::InvalidOrder(message) => Self::InvalidRequest { message },
            AlpacaError::AuthenticationFailed => Self::Authentication {
                message: "Alpaca rejected the API credentials".to_string(),
            },
            AlpacaError::RateLimited { retry_after_secs } => Self::RateLimited {
                retry_after_secs: Some(retry_after_secs),
            },
            AlpacaError::OrderNotFound { order_id } => Self::OrderNotFound { order_id },
        }
    }
}
