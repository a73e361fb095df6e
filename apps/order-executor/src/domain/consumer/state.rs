//! Queue consumer lifecycle.
//!
//! ```text
//! Disconnected -> Connecting -> Ready -> Consuming -> Draining -> Disconnected
//!                      |           |          |
//!                      +-----------+----------+------> Disconnected
//! ```
//!
//! A failed connect, a shutdown before consumption starts, or a transport
//! closure all return the consumer to `Disconnected`.

use std::fmt;

use crate::domain::shared::DomainError;

/// Where the consumer is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConsumerState {
    /// No transport connection.
    #[default]
    Disconnected,
    /// Opening the connection and channel.
    Connecting,
    /// Queue declared; not yet pulling.
    Ready,
    /// Pulling and processing messages.
    Consuming,
    /// Shutdown requested; finishing the in-flight message.
    Draining,
}

impl ConsumerState {
    /// Get the state name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Ready => "ready",
            Self::Consuming => "consuming",
            Self::Draining => "draining",
        }
    }
}

impl fmt::Display for ConsumerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validates consumer state transitions.
pub struct ConsumerStateMachine;

impl ConsumerStateMachine {
    /// Check if a state transition is valid.
    #[must_use]
    pub const fn is_valid_transition(from: ConsumerState, to: ConsumerState) -> bool {
        matches!(
            (from, to),
            (ConsumerState::Disconnected, ConsumerState::Connecting)
                | (ConsumerState::Connecting, ConsumerState::Ready)
                | (ConsumerState::Connecting, ConsumerState::Disconnected)
                | (ConsumerState::Ready, ConsumerState::Consuming)
                | (ConsumerState::Ready, ConsumerState::Disconnected)
                | (ConsumerState::Consuming, ConsumerState::Draining)
                | (ConsumerState::Consuming, ConsumerState::Disconnected)
                | (ConsumerState::Draining, ConsumerState::Disconnected)
        )
    }

    /// Validate a state transition.
    pub fn validate_transition(from: ConsumerState, to: ConsumerState) -> Result<(), DomainError> {
        if Self::is_valid_transition(from, to) {
            Ok(())
        } else {
            Err(DomainError::InvalidStateTransition {
                entity: "Consumer".to_string(),
                from: from.to_string(),
                to: to.to_string(),
            })
        }
    }
}

/// Current lifecycle state, advanced only through valid transitions.
#[derive(Debug, Default)]
pub struct ConsumerLifecycle {
    state: ConsumerState,
}

impl ConsumerLifecycle {
    /// Start disconnected.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> ConsumerState {
        self.state
    }

    /// Move to `to`, rejecting transitions the lifecycle does not allow.
    pub fn transition(&mut self, to: ConsumerState) -> Result<(), DomainError> {
        ConsumerStateMachine::validate_transition(self.state, to)?;
        tracing::debug!(from = %self.state, to = %to, "Consumer state changed");
        self.state = to;
        Ok(())
    }
}
