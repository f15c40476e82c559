//! In-memory collaborators and a scriptable adapter for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use alerter_core::{
    CanonicalRecord, ChangeFeed, ChangeListener, CollaboratorError, DefinitionsLookup, Properties,
    RecordSink, TriggerChange, TriggerKey, TriggerSnapshot,
};

use crate::adapter::{EndpointAdapter, FetchWindow};

pub(crate) const MOCK_TAG: &str = "mock";

// ── Adapter ──────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
#[error("mock failure: {0}")]
pub(crate) struct MockError(String);

pub(crate) struct MockConfig {
    data_id: String,
}

pub(crate) struct MockAdapter {
    name: String,
    items: usize,
    fetch_calls: AtomicUsize,
    resolve_calls: AtomicUsize,
    resolve_failures_left: AtomicUsize,
    failing_fetches: Mutex<HashSet<usize>>,
    panic_on_fetch: bool,
}

impl MockAdapter {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            items: 1,
            fetch_calls: AtomicUsize::new(0),
            resolve_calls: AtomicUsize::new(0),
            resolve_failures_left: AtomicUsize::new(0),
            failing_fetches: Mutex::new(HashSet::new()),
            panic_on_fetch: false,
        }
    }

    pub(crate) fn items_per_fetch(mut self, n: usize) -> Self {
        self.items = n;
        self
    }

    pub(crate) fn fail_resolve_times(self, n: usize) -> Self {
        self.resolve_failures_left.store(n, Ordering::SeqCst);
        self
    }

    /// Fail the fetch with zero-based call index `n`.
    pub(crate) fn fail_fetch_call(self, n: usize) -> Self {
        self.failing_fetches.lock().unwrap().insert(n);
        self
    }

    pub(crate) fn panic_on_fetch(mut self) -> Self {
        self.panic_on_fetch = true;
        self
    }

    pub(crate) fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EndpointAdapter for MockAdapter {
    type Config = MockConfig;
    type QuerySet = Vec<String>;
    type RawItem = f64;
    type Error = MockError;

    fn name(&self) -> &str {
        &self.name
    }

    fn marker_tag(&self) -> &str {
        MOCK_TAG
    }

    fn configure(&self, trigger: &TriggerSnapshot, _defaults: &Properties) -> Result<MockConfig, MockError> {
        if trigger.context_value("broken").is_some() {
            return Err(MockError("broken context".into()));
        }
        Ok(MockConfig {
            data_id: trigger.id.clone(),
        })
    }

    async fn resolve_selectors(&self, config: &MockConfig) -> Result<Vec<String>, MockError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        let left = self.resolve_failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.resolve_failures_left.store(left - 1, Ordering::SeqCst);
            return Err(MockError("selectors unavailable".into()));
        }
        Ok(vec![config.data_id.clone()])
    }

    async fn fetch(
        &self,
        _config: &MockConfig,
        _query_set: &Vec<String>,
        _window: &FetchWindow,
    ) -> Result<Vec<f64>, MockError> {
        let call = self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.panic_on_fetch {
            panic!("adapter bug");
        }
        if self.failing_fetches.lock().unwrap().contains(&call) {
            return Err(MockError(format!("fetch {call} refused")));
        }
        Ok(vec![call as f64; self.items])
    }

    fn map(&self, config: &MockConfig, item: f64) -> Option<CanonicalRecord> {
        Some(CanonicalRecord::metric(&config.data_id, Utc::now(), item))
    }
}

// ── Collaborators ────────────────────────────────────────────

#[derive(Default)]
pub(crate) struct StaticDefinitions {
    triggers: Mutex<HashMap<TriggerKey, TriggerSnapshot>>,
    broken_keys: Mutex<HashSet<TriggerKey>>,
    scan_fails: AtomicBool,
}

impl StaticDefinitions {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn put(&self, trigger: TriggerSnapshot) {
        self.triggers.lock().unwrap().insert(trigger.key(), trigger);
    }

    pub(crate) fn delete(&self, key: &TriggerKey) {
        self.triggers.lock().unwrap().remove(key);
    }

    pub(crate) fn break_lookup(&self, key: TriggerKey) {
        self.broken_keys.lock().unwrap().insert(key);
    }

    pub(crate) fn fail_scans(&self) {
        self.scan_fails.store(true, Ordering::SeqCst);
    }

    pub(crate) fn heal_scans(&self) {
        self.scan_fails.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl DefinitionsLookup for StaticDefinitions {
    async fn get_trigger(
        &self,
        tenant_id: &str,
        trigger_id: &str,
    ) -> Result<Option<TriggerSnapshot>, CollaboratorError> {
        let key = TriggerKey::new(tenant_id, trigger_id);
        if self.broken_keys.lock().unwrap().contains(&key) {
            return Err(CollaboratorError::Lookup(format!("{key} timed out")));
        }
        Ok(self.triggers.lock().unwrap().get(&key).cloned())
    }

    async fn all_triggers_by_tag(&self, tag: &str) -> Result<Vec<TriggerSnapshot>, CollaboratorError> {
        if self.scan_fails.load(Ordering::SeqCst) {
            return Err(CollaboratorError::Unavailable("definitions service".into()));
        }
        Ok(self
            .triggers
            .lock()
            .unwrap()
            .values()
            .filter(|t| t.has_tag(tag))
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub(crate) struct CollectingSink {
    records: Mutex<Vec<CanonicalRecord>>,
    sends: AtomicUsize,
    fail_sends: bool,
    fail_check: bool,
}

impl CollectingSink {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing_sends(mut self) -> Self {
        self.fail_sends = true;
        self
    }

    pub(crate) fn failing_check(mut self) -> Self {
        self.fail_check = true;
        self
    }

    pub(crate) fn records(&self) -> Vec<CanonicalRecord> {
        self.records.lock().unwrap().clone()
    }

    pub(crate) fn send_calls(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordSink for CollectingSink {
    async fn send(&self, records: Vec<CanonicalRecord>) -> Result<(), CollaboratorError> {
        self.sends.fetch_add(1, Ordering::SeqCst);
        if self.fail_sends {
            return Err(CollaboratorError::Sink("ingestion refused".into()));
        }
        self.records.lock().unwrap().extend(records);
        Ok(())
    }

    async fn check(&self) -> Result<(), CollaboratorError> {
        if self.fail_check {
            return Err(CollaboratorError::Unavailable("sink".into()));
        }
        Ok(())
    }
}

/// Change feed whose batches are pushed by the test.
#[derive(Default)]
pub(crate) struct ManualFeed {
    listeners: Mutex<Vec<ChangeListener>>,
}

impl ManualFeed {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn emit(&self, batch: Vec<TriggerChange>) {
        let listeners = self.listeners.lock().unwrap().clone();
        for listener in listeners {
            listener(batch.clone());
        }
    }

    pub(crate) fn listener_count(&self) -> usize {
        self.listeners.lock().unwrap().len()
    }
}

#[async_trait]
impl ChangeFeed for ManualFeed {
    async fn register_listener(&self, listener: ChangeListener) -> Result<(), CollaboratorError> {
        self.listeners.lock().unwrap().push(listener);
        Ok(())
    }
}
