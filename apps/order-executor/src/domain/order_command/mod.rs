//! Order Command Context
//!
//! Trading commands as they arrive from the queue, and the schema validation
//! that turns raw bytes into them.

pub mod command;
pub mod validator;
pub mod value_objects;

pub use command::{CancelOrderCommand, Command, CommandRef, CreateOrderCommand, Operation};
pub use validator::{CommandValidator, Rule, ValidationError, Violation};
pub use value_objects::{OrderSide, OrderType};
