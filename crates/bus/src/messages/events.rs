use serde::{Deserialize, Serialize};

use alerter_core::TriggerChange;

/// Published on [`TRIGGER_CHANGED`](super::topics::TRIGGER_CHANGED) whenever
/// trigger definitions change. Delivered to listeners as one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerChangeBatch {
    pub changes: Vec<TriggerChange>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Heartbeat of an alerter worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerHealth {
    pub worker_id: String,
    pub status: WorkerStatus,
    /// Names of the connectors running inside the worker.
    #[serde(default)]
    pub connectors: Vec<String>,
}
