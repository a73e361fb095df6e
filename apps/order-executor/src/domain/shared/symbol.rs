//! Symbol value object for instrument identifiers.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::shared::DomainError;

/// Alphanumeric segments joined by a single separator (`/`, `:`, `-`, `_`, `.`).
const SYMBOL_PATTERN: &str = r"^[A-Za-z0-9]+(?:[/:\-_.][A-Za-z0-9]+)*$";

static SYMBOL_REGEX: OnceLock<Regex> = OnceLock::new();

/// Compiled instrument pattern, built on first use and shared afterwards.
#[allow(clippy::expect_used)]
pub(crate) fn symbol_regex() -> &'static Regex {
    SYMBOL_REGEX.get_or_init(|| Regex::new(SYMBOL_PATTERN).expect("static symbol pattern is valid"))
}

/// A venue instrument identifier.
///
/// Examples:
/// - Crypto pair: "BTC/USD", "ETH/EUR"
/// - Equity: "AAPL"
/// - Derivative: "ETH-PERP", "XBT:USD"
///
/// The value is kept as received; venues differ on case conventions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    /// Create a symbol after checking it against the instrument pattern.
    pub fn parse(value: impl Into<String>) -> Result<Self, DomainError> {
        let symbol = Self(value.into());
        symbol.validate()?;
        Ok(symbol)
    }

    /// Create a symbol without validation.
    #[must_use]
    pub fn new_unchecked(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Check the symbol is non-empty and well formed.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.0.is_empty() {
            return Err(DomainError::InvalidValue {
                field: "symbol".to_string(),
                message: "cannot be empty".to_string(),
            });
        }
        if !symbol_regex().is_match(&self.0) {
            return Err(DomainError::InvalidValue {
                field: "symbol".to_string(),
                message: format!("'{}' is not a valid instrument symbol", self.0),
            });
        }
        Ok(())
    }

    /// Get the symbol string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume and return the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
