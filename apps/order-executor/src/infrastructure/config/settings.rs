//! Worker Configuration Settings
//!
//! Configuration types for the order executor, loaded from environment
//! variables. Credentials are checked before anything else so a worker
//! without them never touches the broker.

use std::str::FromStr;
use std::time::Duration;

use crate::domain::consumer::AckPolicy;
use crate::domain::shared::Symbol;
use crate::infrastructure::exchange::{AlpacaEnvironment, UnsupportedVenue, Venue};

/// Default AMQP broker address.
pub const DEFAULT_AMQP_ADDR: &str = "amqp://127.0.0.1:5672/%2f";

/// Venue API credentials.
#[derive(Clone)]
pub struct Credentials {
    api_key: String,
    api_secret: String,
}

impl Credentials {
    /// Create new credentials.
    #[must_use]
    pub const fn new(api_key: String, api_secret: String) -> Self {
        Self {
            api_key,
            api_secret,
        }
    }

    /// Get the API key.
    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Get the API secret.
    #[must_use]
    pub fn api_secret(&self) -> &str {
        &self.api_secret
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"[REDACTED]")
            .field("api_secret", &"[REDACTED]")
            .finish()
    }
}

/// Queue declaration and consumption settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSettings {
    /// Queue name.
    pub name: String,
    /// Survive broker restarts.
    pub durable: bool,
    /// Delete the queue when the last consumer leaves.
    pub auto_delete: bool,
    /// Per-message TTL (`x-message-ttl`) in milliseconds.
    pub message_ttl_ms: u32,
    /// Unacknowledged deliveries the broker may push ahead.
    pub prefetch: u16,
}

impl QueueSettings {
    /// Defaults for a queue named `name`.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            durable: false,
            auto_delete: false,
            message_ttl_ms: 20_000,
            prefetch: 1,
        }
    }
}

/// Venue client settings.
#[derive(Debug, Clone)]
pub struct ExchangeSettings {
    /// API credentials.
    pub credentials: Credentials,
    /// Alpaca paper or live endpoint.
    pub alpaca_environment: AlpacaEnvironment,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Minimum spacing between venue requests.
    pub min_request_interval: Duration,
}

/// Complete worker configuration.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Venue to trade on.
    pub venue: Venue,
    /// AMQP broker address.
    pub amqp_addr: String,
    /// Market this worker trades, used as the default symbol for cancels.
    pub market: Option<Symbol>,
    /// Queue settings.
    pub queue: QueueSettings,
    /// When deliveries are acknowledged.
    pub ack_policy: AckPolicy,
    /// Venue client settings.
    pub exchange: ExchangeSettings,
    /// Prometheus exporter port (0 = disabled).
    pub metrics_port: u16,
}

impl ExecutorConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// `MissingCredentials` if `API_KEY` or `API_SECRET` is unset or empty,
    /// otherwise an error for a missing venue or an unparseable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("API_KEY").filter(|v| !v.is_empty());
        let api_secret = lookup("API_SECRET").filter(|v| !v.is_empty());
        let (Some(api_key), Some(api_secret)) = (api_key, api_secret) else {
            return Err(ConfigError::MissingCredentials);
        };

        let venue: Venue = lookup("EXECUTOR_VENUE")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("EXECUTOR_VENUE".to_string()))?
            .parse()?;

        let amqp_addr = lookup("AMQP_ADDR")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_AMQP_ADDR.to_string());

        let market = match lookup("EXECUTOR_MARKET").filter(|v| !v.is_empty()) {
            Some(raw) => Some(Symbol::parse(raw.as_str()).map_err(|e| {
                ConfigError::invalid("EXECUTOR_MARKET", &raw, e.to_string())
            })?),
            None => None,
        };

        let queue_name = lookup("EXECUTOR_QUEUE")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| venue.as_str().to_string());
        let defaults = QueueSettings::named(queue_name);
        let queue = QueueSettings {
            durable: parse_env_bool(&lookup, "QUEUE_DURABLE", defaults.durable)?,
            message_ttl_ms: parse_env(&lookup, "QUEUE_MESSAGE_TTL_MS", defaults.message_ttl_ms)?,
            prefetch: parse_env(&lookup, "QUEUE_PREFETCH", defaults.prefetch)?,
            ..defaults
        };
        if queue.prefetch == 0 {
            return Err(ConfigError::invalid(
                "QUEUE_PREFETCH",
                "0",
                "must be at least 1; 0 means unlimited to the broker",
            ));
        }

        let ack_policy = match lookup("EXECUTOR_ACK_POLICY").filter(|v| !v.is_empty()) {
            Some(raw) => AckPolicy::from_str(&raw)
                .map_err(|e| ConfigError::invalid("EXECUTOR_ACK_POLICY", &raw, e.to_string()))?,
            None => AckPolicy::default(),
        };

        let exchange = ExchangeSettings {
            credentials: Credentials::new(api_key, api_secret),
            alpaca_environment: parse_env(&lookup, "ALPACA_ENV", AlpacaEnvironment::default())?,
            timeout: Duration::from_millis(parse_env(&lookup, "EXCHANGE_TIMEOUT_MS", 30_000)?),
            min_request_interval: Duration::from_millis(parse_env(
                &lookup,
                "EXCHANGE_RATE_LIMIT_MS",
                200,
            )?),
        };

        Ok(Self {
            venue,
            amqp_addr,
            market,
            queue,
            ack_policy,
            exchange,
            metrics_port: parse_env(&lookup, "METRICS_PORT", 0)?,
        })
    }

    /// AMQP address with any password masked, for logs.
    #[must_use]
    pub fn amqp_addr_redacted(&self) -> String {
        redact_url_password(&self.amqp_addr)
    }
}

/// Configuration error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// `API_KEY` or `API_SECRET` is missing.
    #[error("no API credentials defined: set API_KEY and API_SECRET")]
    MissingCredentials,
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable could not be parsed.
    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Raw value.
        value: String,
        /// Why it was refused.
        reason: String,
    },
    /// Venue name not supported.
    #[error(transparent)]
    UnsupportedVenue(#[from] UnsupportedVenue),
}

impl ConfigError {
    fn invalid(key: &str, value: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

fn parse_env<T, F>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::invalid(key, &raw, e.to_string())),
        None => Ok(default),
    }
}

fn parse_env_bool<F>(lookup: &F, key: &str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        Some(raw) => match raw.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::invalid(key, &raw, "expected true or false")),
        },
        None => Ok(default),
    }
}

fn redact_url_password(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    let Some((userinfo, host)) = rest.split_once('@') else {
        return url.to_string();
    };
    match userinfo.split_once(':') {
        Some((user, _)) => format!("{scheme}://{user}:***@{host}"),
        None => url.to_string(),
    }
}
