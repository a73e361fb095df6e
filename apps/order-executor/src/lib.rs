#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! Order Executor - Queue-driven order execution worker
//!
//! Reads JSON trading commands from a RabbitMQ queue, one at a time,
//! validates each against its operation's schema and turns it into exactly
//! one create or cancel call on the configured venue.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: commands, validation, consumer lifecycle
//!   - `order_command`: create/cancel commands and the schema validator
//!   - `consumer`: lifecycle state machine and acknowledgement policy
//!   - `shared`: symbols, identifiers, domain errors
//!
//! - **Application**: ports and use cases
//!   - `ports`: `ExchangeClient`, `MessageSource`
//!   - `use_cases`: `OrderDispatcher`, `CommandConsumer`
//!
//! - **Infrastructure**: adapters
//!   - `exchange`: Alpaca REST client, paper simulator, venue factory
//!   - `queue`: RabbitMQ transport
//!   - `config`: environment configuration
//!
//! # Data Flow
//!
//! ```text
//! RabbitMQ ──► RabbitMqTransport ──► CommandConsumer ──► CommandValidator
//!                                         │
//!                                         ▼
//!                                  OrderDispatcher ──► ExchangeClient ──► venue
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Clean Architecture Layers
// =============================================================================

/// Domain layer - Commands and consumer rules with no I/O.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

/// Logging, tracing and metrics.
pub mod observability;

/// Worker process wiring.
pub mod worker;

// =============================================================================
// Re-exports
// =============================================================================

pub use domain::consumer::{AckPolicy, ConsumerLifecycle, ConsumerState};
pub use domain::order_command::{
    CancelOrderCommand, Command, CommandValidator, CreateOrderCommand, OrderSide, OrderType,
    ValidationError,
};

pub use application::ports::{
    ExchangeClient, ExchangeError, InboundMessage, MessageSource, QueueError,
};
pub use application::use_cases::{
    CommandConsumer, ConsumerReport, ExecutionOutcome, MessageOutcome, OrderDispatcher,
    StopReason,
};

pub use infrastructure::config::{ConfigError, ExecutorConfig};
pub use infrastructure::exchange::{PaperExchange, Venue, VenueClient, build_exchange};

pub use worker::{Worker, WorkerError, build_consumer};
