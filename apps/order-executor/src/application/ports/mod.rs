//! Application Ports (Driver and Driven)
//!
//! Ports define interfaces for interacting with external systems.
//! - **Driver Ports** (Primary/Inbound): How the world uses our application
//! - **Driven Ports** (Secondary/Outbound): How our application uses external systems

mod exchange_port;
mod message_queue_port;

#[cfg(test)]
pub use exchange_port::MockExchangeClient;
pub use exchange_port::{
    CancelOrderRequest, CancelResult, CreateOrderRequest, ExchangeClient, ExchangeError,
    OrderResult, VenueOrderStatus,
};
pub use message_queue_port::{Acknowledger, InboundMessage, MessageSource, QueueError};
