//! Process wiring for the alerter worker: HTTP clients for the definitions
//! service and the ingestion sink, the static alerter registry, and the
//! [`alerter_bus::Worker`] that owns the enabled connectors.

pub mod definitions;
pub mod error;
pub mod registry;
pub mod sink;
pub mod worker;

pub use definitions::HttpDefinitions;
pub use error::WorkerError;
pub use registry::{AlerterEntry, ALERTERS};
pub use sink::HttpSink;
pub use worker::AlerterWorker;
