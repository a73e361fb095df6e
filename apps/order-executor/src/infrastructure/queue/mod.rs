//! Message queue transport adapters.

mod rabbitmq;

pub use rabbitmq::RabbitMqTransport;
