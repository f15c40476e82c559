//! Endpoint adapters for the polling scheduler.
//!
//! Each module wraps one external telemetry system behind
//! [`alerter_scheduler::EndpointAdapter`], with the remote calls isolated in
//! an async trait so the selection and mapping logic can be tested without a
//! live service.

pub mod document_store;
pub mod error;
pub mod http;
pub mod metrics_store;
pub mod query_engine;
mod settings;

pub use document_store::DocumentStoreAdapter;
pub use error::AdapterError;
pub use http::{Auth, Endpoint};
pub use metrics_store::MetricsStoreAdapter;
pub use query_engine::QueryEngineAdapter;
