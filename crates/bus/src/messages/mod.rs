//! Payloads carried on the bus and the topics they travel under.

pub mod events;
pub mod topics;

pub use events::*;
