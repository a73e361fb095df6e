//! Domain Layer
//!
//! The innermost layer containing business logic with zero infrastructure dependencies.
//!
//! # Bounded Contexts
//!
//! - [`order_command`]: Trading commands and their schema validation
//! - [`consumer`]: Queue consumer lifecycle and acknowledgement policy
//! - [`shared`]: Symbols, identifiers and domain errors

pub mod consumer;
pub mod order_command;
pub mod shared;
