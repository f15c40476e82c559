//! Boundaries to the rest of the alerting platform.
//!
//! Connectors only ever talk to definitions, change notifications and the
//! ingestion sink through these traits, so they can be driven by in-memory
//! fakes in tests and by HTTP or ZeroMQ clients in the worker.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::CollaboratorError;
use crate::model::{CanonicalRecord, TriggerChange, TriggerSnapshot};

/// Read access to trigger definitions.
#[async_trait]
pub trait DefinitionsLookup: Send + Sync {
    /// Current definition of one trigger, `None` when it no longer exists.
    async fn get_trigger(
        &self,
        tenant_id: &str,
        trigger_id: &str,
    ) -> Result<Option<TriggerSnapshot>, CollaboratorError>;

    /// Every trigger, across tenants, carrying `tag`.
    async fn all_triggers_by_tag(&self, tag: &str) -> Result<Vec<TriggerSnapshot>, CollaboratorError>;
}

/// Callback invoked with each delivered batch of change notifications.
///
/// Listeners are called on the feed's delivery task and must not block.
pub type ChangeListener = Arc<dyn Fn(Vec<TriggerChange>) + Send + Sync>;

/// Source of distributed trigger change notifications.
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    async fn register_listener(&self, listener: ChangeListener) -> Result<(), CollaboratorError>;
}

/// Destination for canonical records.
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn send(&self, records: Vec<CanonicalRecord>) -> Result<(), CollaboratorError>;

    /// Startup probe; a connector refuses to start when this fails.
    async fn check(&self) -> Result<(), CollaboratorError> {
        Ok(())
    }
}

#[async_trait]
impl<T: DefinitionsLookup + ?Sized> DefinitionsLookup for Arc<T> {
    async fn get_trigger(
        &self,
        tenant_id: &str,
        trigger_id: &str,
    ) -> Result<Option<TriggerSnapshot>, CollaboratorError> {
        (**self).get_trigger(tenant_id, trigger_id).await
    }

    async fn all_triggers_by_tag(&self, tag: &str) -> Result<Vec<TriggerSnapshot>, CollaboratorError> {
        (**self).all_triggers_by_tag(tag).await
    }
}

#[async_trait]
impl<T: RecordSink + ?Sized> RecordSink for Arc<T> {
    async fn send(&self, records: Vec<CanonicalRecord>) -> Result<(), CollaboratorError> {
        (**self).send(records).await
    }

    async fn check(&self) -> Result<(), CollaboratorError> {
        (**self).check().await
    }
}
