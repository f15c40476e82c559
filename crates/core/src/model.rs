//! Trigger snapshots, change notifications, and the canonical record
//! produced by every endpoint adapter.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Trigger identity ──────────────────────────────────────────

/// Identity of a trigger: the only key used by the active set and the job map.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TriggerKey {
    pub tenant_id: String,
    pub trigger_id: String,
}

impl TriggerKey {
    pub fn new(tenant_id: impl Into<String>, trigger_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            trigger_id: trigger_id.into(),
        }
    }
}

impl fmt::Display for TriggerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.tenant_id, self.trigger_id)
    }
}

// ── Trigger snapshot ──────────────────────────────────────────

/// An external condition attached to a trigger.
///
/// Only the time-series query engine reads these: each condition carries the
/// expression evaluated remotely and the data id its results are reported under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExternalCondition {
    pub alerter_id: String,
    pub data_id: String,
    pub expression: String,
}

/// Immutable copy of a trigger definition as seen by a connector.
///
/// Snapshots are replaced wholesale when a trigger changes; nothing mutates
/// one after it has been stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerSnapshot {
    pub tenant_id: String,
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Group templates are never polled directly, only their members.
    #[serde(default)]
    pub group: bool,
    #[serde(default)]
    pub tags: HashMap<String, String>,
    #[serde(default)]
    pub context: HashMap<String, String>,
    #[serde(default)]
    pub conditions: Vec<ExternalCondition>,
}

fn default_enabled() -> bool {
    true
}

impl TriggerSnapshot {
    /// Create an enabled, untagged, context-free snapshot.
    pub fn new(tenant_id: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            id: id.into(),
            name: String::new(),
            enabled: true,
            group: false,
            tags: HashMap::new(),
            context: HashMap::new(),
            conditions: Vec::new(),
        }
    }

    pub fn with_tag(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(name.into(), value.into());
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn with_condition(mut self, condition: ExternalCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn key(&self) -> TriggerKey {
        TriggerKey::new(&self.tenant_id, &self.id)
    }

    /// Enabled and not a group template.
    pub fn is_loadable(&self) -> bool {
        self.enabled && !self.group
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains_key(tag)
    }

    /// Non-empty context value for `key`.
    pub fn context_value(&self, key: &str) -> Option<&str> {
        self.context
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }
}

// ── Change notifications ──────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOperation {
    Add,
    Update,
    Remove,
}

impl fmt::Display for ChangeOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Add => "add",
            Self::Update => "update",
            Self::Remove => "remove",
        };
        f.write_str(s)
    }
}

/// One entry of a distributed change notification batch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TriggerChange {
    pub tenant_id: String,
    pub trigger_id: String,
    pub operation: ChangeOperation,
}

impl TriggerChange {
    pub fn new(
        tenant_id: impl Into<String>,
        trigger_id: impl Into<String>,
        operation: ChangeOperation,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            trigger_id: trigger_id.into(),
            operation,
        }
    }

    pub fn key(&self) -> TriggerKey {
        TriggerKey::new(&self.tenant_id, &self.trigger_id)
    }
}

// ── Canonical record ──────────────────────────────────────────

/// Structured event body carried by [`RecordPayload::Event`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EventPayload {
    pub id: String,
    #[serde(default)]
    pub data_source: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordPayload {
    /// Numeric sample of a metric series.
    Metric { value: f64 },
    /// Structured event.
    Event(EventPayload),
}

/// The unit pushed into the platform's ingestion sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub tenant_id: String,
    pub data_id: String,
    pub timestamp: DateTime<Utc>,
    pub payload: RecordPayload,
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl CanonicalRecord {
    /// Metric sample with an empty tenant; the query task stamps the tenant.
    pub fn metric(data_id: impl Into<String>, timestamp: DateTime<Utc>, value: f64) -> Self {
        Self {
            tenant_id: String::new(),
            data_id: data_id.into(),
            timestamp,
            payload: RecordPayload::Metric { value },
            context: HashMap::new(),
        }
    }

    pub fn event(
        data_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        event: EventPayload,
    ) -> Self {
        Self {
            tenant_id: String::new(),
            data_id: data_id.into(),
            timestamp,
            payload: RecordPayload::Event(event),
            context: HashMap::new(),
        }
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = tenant_id.into();
        self
    }

    pub fn is_metric(&self) -> bool {
        matches!(self.payload, RecordPayload::Metric { .. })
    }

    pub fn metric_value(&self) -> Option<f64> {
        match self.payload {
            RecordPayload::Metric { value } => Some(value),
            RecordPayload::Event(_) => None,
        }
    }

    pub fn as_event(&self) -> Option<&EventPayload> {
        match &self.payload {
            RecordPayload::Event(e) => Some(e),
            RecordPayload::Metric { .. } => None,
        }
    }
}
