//! Application Use Cases
//!
//! - [`OrderDispatcher`]: one validated command to one venue call
//! - [`CommandConsumer`]: the sequential consume, validate, dispatch loop

mod consume_commands;
mod dispatch_order;

pub use consume_commands::{
    CommandConsumer, ConsumerReport, ConsumerStats, MessageOutcome, StopReason,
};
pub use dispatch_order::{ExecutionOutcome, OrderDispatcher, VenueResult};
