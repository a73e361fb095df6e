//! Message acknowledgement policy.

use std::fmt;
use std::str::FromStr;

use crate::domain::shared::DomainError;

/// When a consumed message is acknowledged to the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AckPolicy {
    /// The broker considers a message delivered as soon as it is handed
    /// over (auto-ack). A crash mid-dispatch loses that message.
    #[default]
    AtMostOnceImmediateAck,
    /// Ack after the message has been fully handled, whatever the outcome.
    /// A crash before the ack causes redelivery, so a command may run twice.
    ProcessThenAck,
}

impl AckPolicy {
    /// Whether the transport should consume in auto-ack (`no_ack`) mode.
    #[must_use]
    pub const fn auto_ack(&self) -> bool {
        matches!(self, Self::AtMostOnceImmediateAck)
    }

    /// Get the policy name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AtMostOnceImmediateAck => "at_most_once",
            Self::ProcessThenAck => "process_then_ack",
        }
    }
}

impl fmt::Display for AckPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AckPolicy {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "at_most_once" | "immediate" | "auto" => Ok(Self::AtMostOnceImmediateAck),
            "process_then_ack" | "manual" => Ok(Self::ProcessThenAck),
            other => Err(DomainError::InvalidValue {
                field: "ack_policy".to_string(),
                message: format!("unknown policy '{other}'"),
            }),
        }
    }
}
