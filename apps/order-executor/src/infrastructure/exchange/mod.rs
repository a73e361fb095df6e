//! Exchange Clients
//!
//! Implementations of `ExchangeClient` for each supported venue.

pub mod alpaca;
mod paper;
mod throttle;
mod venue;

pub use alpaca::{
    AlpacaConfig, AlpacaEnvironment, AlpacaError, AlpacaExchange, UnknownEnvironment,
};
pub use paper::PaperExchange;
pub use throttle::RequestThrottle;
pub use venue::{UnsupportedVenue, Venue, VenueClient, build_exchange};
