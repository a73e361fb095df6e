//! Configuration Module
//!
//! Environment-driven configuration for the worker.

mod settings;

pub use settings::{
    ConfigError, Credentials, DEFAULT_AMQP_ADDR, ExchangeSettings, ExecutorConfig, QueueSettings,
};
