//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer.

/// Environment-driven configuration.
pub mod config;

/// Venue clients (Alpaca, paper) and the venue factory.
pub mod exchange;

/// RabbitMQ transport.
pub mod queue;
