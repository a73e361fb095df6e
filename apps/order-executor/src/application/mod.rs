//! Application Layer
//!
//! Orchestrates the domain through use cases and defines the ports that
//! infrastructure adapters implement.

pub mod ports;
pub mod use_cases;
