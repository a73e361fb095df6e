//! Shared Domain Types
//!
//! Value objects and errors shared across the domain.

pub mod errors;
pub mod identifiers;
pub mod symbol;

pub use errors::DomainError;
pub use identifiers::{ClientOrderId, VenueOrderId};
pub use symbol::Symbol;
