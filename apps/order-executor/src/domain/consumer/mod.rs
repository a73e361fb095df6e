//! Queue consumer lifecycle and delivery policy.

pub mod ack_policy;
pub mod state;

pub use ack_policy::AckPolicy;
pub use state::{ConsumerLifecycle, ConsumerState, ConsumerStateMachine};
