use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use alerter_core::{TriggerKey, TriggerSnapshot};

/// Triggers a connector currently polls.
///
/// Safe for concurrent readers and writers; every method holds the lock for
/// exactly one map operation.
#[derive(Debug, Default)]
pub struct ActiveTriggerSet {
    triggers: RwLock<HashMap<TriggerKey, Arc<TriggerSnapshot>>>,
}

impl ActiveTriggerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace; returns the previous snapshot.
    pub fn upsert(&self, snapshot: TriggerSnapshot) -> Option<Arc<TriggerSnapshot>> {
        let key = snapshot.key();
        self.triggers
            .write()
            .expect("active triggers lock poisoned")
            .insert(key, Arc::new(snapshot))
    }

    pub fn remove(&self, key: &TriggerKey) -> Option<Arc<TriggerSnapshot>> {
        self.triggers
            .write()
            .expect("active triggers lock poisoned")
            .remove(key)
    }

    pub fn get(&self, key: &TriggerKey) -> Option<Arc<TriggerSnapshot>> {
        self.triggers
            .read()
            .expect("active triggers lock poisoned")
            .get(key)
            .cloned()
    }

    pub fn contains(&self, key: &TriggerKey) -> bool {
        self.triggers
            .read()
            .expect("active triggers lock poisoned")
            .contains_key(key)
    }

    /// Point-in-time copy of the whole set.
    pub fn snapshot(&self) -> HashMap<TriggerKey, Arc<TriggerSnapshot>> {
        self.triggers
            .read()
            .expect("active triggers lock poisoned")
            .clone()
    }

    pub fn len(&self) -> usize {
        self.triggers.read().expect("active triggers lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.triggers
            .write()
            .expect("active triggers lock poisoned")
            .clear();
    }
}
