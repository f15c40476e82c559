//! Generic trigger-driven polling scheduler.
//!
//! A [`Connector`] keeps the set of triggers tagged for one
//! [`EndpointAdapter`], reacts to trigger change notifications, and runs one
//! periodic [`QueryTask`] per active trigger that turns remote query results
//! into canonical records.

pub mod active;
pub mod adapter;
pub mod config;
pub mod connector;
pub mod error;
pub mod job;
pub mod reconciler;
pub mod subscriber;
pub mod task;

#[cfg(test)]
pub(crate) mod test_support;

pub use active::ActiveTriggerSet;
pub use adapter::{EndpointAdapter, FetchWindow, INTERVAL_KEY};
pub use config::ConnectorConfig;
pub use connector::{Alerter, Collaborators, Connector};
pub use error::SchedulerError;
pub use job::ScheduledJobHandle;
pub use reconciler::{ReconcileReport, Reconciler};
pub use subscriber::{BatchSummary, ChangeFeedSubscriber, ChangeInbox};
pub use task::{QueryTask, TickOutcome, TickStage};
