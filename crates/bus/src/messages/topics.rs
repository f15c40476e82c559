//! Topic constants for PUB/SUB routing.
//!
//! Topics follow `alerts.<domain>.<event>`.

/// A batch of trigger additions, updates and removals.
pub const TRIGGER_CHANGED: &str = "alerts.trigger.changed";

/// Periodic worker health heartbeat.
pub const WORKER_HEALTH: &str = "alerts.worker.health";
