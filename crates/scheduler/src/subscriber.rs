//! Keeps the active trigger set in line with trigger definitions.

use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use alerter_core::{
    ChangeListener, ChangeOperation, CollaboratorError, DefinitionsLookup, TriggerChange,
    TriggerSnapshot,
};

use crate::active::ActiveTriggerSet;
use crate::adapter::EndpointAdapter;
use crate::reconciler::{ReconcileReport, Reconciler};

/// Effect of applying one change batch to the active set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub upserted: usize,
    pub removed: usize,
    /// Changes whose definition lookup failed; the previous state was kept.
    pub skipped: usize,
}

/// Queue between a connector's feed listener and its refresh worker.
///
/// The feed holds one listener from [`ChangeInbox::listener`] for the life of
/// the connector. Each start opens a fresh queue behind it and each stop
/// closes it; batches arriving while closed are dropped.
#[derive(Clone, Default)]
pub struct ChangeInbox {
    tx: Arc<Mutex<Option<mpsc::UnboundedSender<Vec<TriggerChange>>>>>,
}

impl ChangeInbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the queue, returning its receiving end.
    pub fn open(&self) -> mpsc::UnboundedReceiver<Vec<TriggerChange>> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.tx.lock().expect("change inbox lock poisoned") = Some(tx);
        rx
    }

    pub fn close(&self) {
        self.tx.lock().expect("change inbox lock poisoned").take();
    }

    pub fn is_open(&self) -> bool {
        self.tx.lock().expect("change inbox lock poisoned").is_some()
    }

    /// Listener that only enqueues; all work happens on the refresh worker.
    pub fn listener(&self) -> ChangeListener {
        let tx = self.tx.clone();
        Arc::new(move |batch: Vec<TriggerChange>| {
            let guard = tx.lock().expect("change inbox lock poisoned");
            match guard.as_ref() {
                Some(queue) if queue.send(batch).is_ok() => {}
                _ => debug!("no refresh worker, dropping change batch"),
            }
        })
    }
}

pub struct ChangeFeedSubscriber<A: EndpointAdapter> {
    adapter: Arc<A>,
    definitions: Arc<dyn DefinitionsLookup>,
    active: Arc<ActiveTriggerSet>,
    reconciler: Arc<Reconciler<A>>,
}

impl<A: EndpointAdapter> ChangeFeedSubscriber<A> {
    pub fn new(
        adapter: Arc<A>,
        definitions: Arc<dyn DefinitionsLookup>,
        active: Arc<ActiveTriggerSet>,
        reconciler: Arc<Reconciler<A>>,
    ) -> Self {
        Self {
            adapter,
            definitions,
            active,
            reconciler,
        }
    }

    /// Loadable and carrying this connector's marker tag.
    pub fn admits(&self, trigger: &TriggerSnapshot) -> bool {
        trigger.is_loadable() && trigger.has_tag(self.adapter.marker_tag())
    }

    /// Load every tagged trigger and run the first reconciliation.
    pub async fn bootstrap(&self) -> Result<ReconcileReport, CollaboratorError> {
        let tag = self.adapter.marker_tag();
        let triggers = self.definitions.all_triggers_by_tag(tag).await?;
        let found = triggers.len();

        let mut loaded = 0;
        for trigger in triggers {
            if self.admits(&trigger) {
                self.active.upsert(trigger);
                loaded += 1;
            }
        }
        info!(connector = %self.adapter.name(), tag, found, loaded, "initial triggers loaded");
        Ok(self.reconciler.reconcile().await)
    }

    /// Apply a batch to the active set without reconciling.
    pub async fn apply(&self, batch: Vec<TriggerChange>) -> BatchSummary {
        let mut summary = BatchSummary::default();
        for change in batch {
            let key = change.key();
            if change.operation == ChangeOperation::Remove {
                if self.active.remove(&key).is_some() {
                    summary.removed += 1;
                }
                continue;
            }

            match self
                .definitions
                .get_trigger(&change.tenant_id, &change.trigger_id)
                .await
            {
                Ok(Some(trigger)) if self.admits(&trigger) => {
                    self.active.upsert(trigger);
                    summary.upserted += 1;
                }
                Ok(_) => {
                    // Gone, disabled, a group, or no longer tagged for us.
                    if self.active.remove(&key).is_some() {
                        summary.removed += 1;
                    }
                }
                Err(e) => {
                    warn!(
                        connector = %self.adapter.name(),
                        trigger = %key,
                        operation = %change.operation,
                        error = %e,
                        "trigger lookup failed, keeping previous state"
                    );
                    summary.skipped += 1;
                }
            }
        }
        summary
    }

    /// Apply a batch, then reconcile once.
    pub async fn refresh(&self, batch: Vec<TriggerChange>) -> ReconcileReport {
        let size = batch.len();
        let summary = self.apply(batch).await;
        debug!(
            connector = %self.adapter.name(),
            size,
            upserted = summary.upserted,
            removed = summary.removed,
            skipped = summary.skipped,
            "change batch applied"
        );
        self.reconciler.reconcile().await
    }

    /// Consume queued batches one at a time until `shutdown` flips or the
    /// queue closes.
    pub fn spawn_refresh_worker(
        self: Arc<Self>,
        mut batches: mpsc::UnboundedReceiver<Vec<TriggerChange>>,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.changed() => break,
                    batch = batches.recv() => match batch {
                        Some(batch) => {
                            self.refresh(batch).await;
                        }
                        None => break,
                    },
                }
            }
            debug!(connector = %self.adapter.name(), "refresh worker exited");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use alerter_core::{Properties, TriggerKey, DEFAULT_INTERVAL};

    use crate::test_support::{CollectingSink, MockAdapter, StaticDefinitions, MOCK_TAG};

    struct Fixture {
        definitions: Arc<StaticDefinitions>,
        active: Arc<ActiveTriggerSet>,
        reconciler: Arc<Reconciler<MockAdapter>>,
        subscriber: Arc<ChangeFeedSubscriber<MockAdapter>>,
    }

    fn fixture() -> Fixture {
        let adapter = Arc::new(MockAdapter::new("mock"));
        let definitions = Arc::new(StaticDefinitions::new());
        let active = Arc::new(ActiveTriggerSet::new());
        let reconciler = Arc::new(Reconciler::new(
            adapter.clone(),
            active.clone(),
            Arc::new(CollectingSink::new()),
            Arc::new(Properties::empty()),
            2,
            DEFAULT_INTERVAL,
        ));
        let subscriber = Arc::new(ChangeFeedSubscriber::new(
            adapter,
            definitions.clone(),
            active.clone(),
            reconciler.clone(),
        ));
        Fixture {
            definitions,
            active,
            reconciler,
            subscriber,
        }
    }

    fn tagged(id: &str) -> TriggerSnapshot {
        TriggerSnapshot::new("acme", id).with_tag(MOCK_TAG, "")
    }

    fn change(id: &str, op: ChangeOperation) -> TriggerChange {
        TriggerChange::new("acme", id, op)
    }

    #[tokio::test(start_paused = true)]
    async fn bootstrap_loads_only_eligible_triggers() {
        let f = fixture();
        f.definitions.put(tagged("ok"));
        f.definitions.put(tagged("off").disabled());
        let mut group = tagged("grp");
        group.group = true;
        f.definitions.put(group);
        f.definitions.put(TriggerSnapshot::new("acme", "untagged"));

        let report = f.subscriber.bootstrap().await.unwrap();
        assert_eq!(report.scheduled(), 1);
        assert_eq!(f.active.len(), 1);
        assert!(f.active.contains(&TriggerKey::new("acme", "ok")));
    }

    #[tokio::test]
    async fn bootstrap_failure_is_reported() {
        let f = fixture();
        f.definitions.fail_scans();
        assert!(f.subscriber.bootstrap().await.is_err());
        assert_eq!(f.reconciler.job_count().await, 0);
    }

    #[tokio::test]
    async fn add_and_update_refetch_definitions() {
        let f = fixture();
        f.definitions.put(tagged("a").with_context("interval", "1m"));
        let summary = f.subscriber.apply(vec![change("a", ChangeOperation::Add)]).await;
        assert_eq!(summary.upserted, 1);

        f.definitions.put(tagged("a").with_context("interval", "5m"));
        f.subscriber.apply(vec![change("a", ChangeOperation::Update)]).await;
        let stored = f.active.get(&TriggerKey::new("acme", "a")).unwrap();
        assert_eq!(stored.context_value("interval"), Some("5m"));
    }

    #[tokio::test]
    async fn ineligible_or_missing_definitions_are_removed() {
        let f = fixture();
        for id in ["gone", "off", "untagged"] {
            f.active.upsert(tagged(id));
        }
        f.definitions.put(tagged("off").disabled());
        f.definitions.put(TriggerSnapshot::new("acme", "untagged"));

        let summary = f
            .subscriber
            .apply(vec![
                change("gone", ChangeOperation::Update),
                change("off", ChangeOperation::Update),
                change("untagged", ChangeOperation::Add),
            ])
            .await;
        assert_eq!(summary.removed, 3);
        assert!(f.active.is_empty());
    }

    #[tokio::test]
    async fn remove_skips_the_lookup() {
        let f = fixture();
        f.active.upsert(tagged("a"));
        f.definitions.break_lookup(TriggerKey::new("acme", "a"));

        let summary = f.subscriber.apply(vec![change("a", ChangeOperation::Remove)]).await;
        assert_eq!(summary.removed, 1);
        assert_eq!(summary.skipped, 0);
    }

    #[tokio::test]
    async fn lookup_failure_keeps_previous_snapshot() {
        let f = fixture();
        f.active.upsert(tagged("a").with_context("interval", "1m"));
        f.definitions.put(tagged("b"));
        f.definitions.break_lookup(TriggerKey::new("acme", "a"));

        let summary = f
            .subscriber
            .apply(vec![change("a", ChangeOperation::Update), change("b", ChangeOperation::Add)])
            .await;
        assert_eq!(summary, BatchSummary { upserted: 1, removed: 0, skipped: 1 });
        let kept = f.active.get(&TriggerKey::new("acme", "a")).unwrap();
        assert_eq!(kept.context_value("interval"), Some("1m"));
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_worker_reconciles_after_each_batch() {
        let f = fixture();
        f.definitions.put(tagged("a"));
        f.definitions.put(tagged("b"));

        let inbox = ChangeInbox::new();
        let listener = inbox.listener();
        let (stop, stop_rx) = watch::channel(false);
        let worker = f.subscriber.clone().spawn_refresh_worker(inbox.open(), stop_rx);

        listener(vec![change("a", ChangeOperation::Add), change("b", ChangeOperation::Add)]);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(f.reconciler.job_count().await, 2);

        listener(vec![change("a", ChangeOperation::Remove)]);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(
            f.reconciler.scheduled_keys().await,
            vec![TriggerKey::new("acme", "b")]
        );

        stop.send(true).unwrap();
        worker.await.unwrap();
    }

    #[tokio::test]
    async fn inbox_forwards_only_while_open() {
        let inbox = ChangeInbox::new();
        let listener = inbox.listener();
        assert!(!inbox.is_open());
        listener(vec![change("dropped", ChangeOperation::Add)]);

        let mut first = inbox.open();
        listener(vec![change("a", ChangeOperation::Add)]);
        assert_eq!(first.recv().await.unwrap()[0].trigger_id, "a");

        inbox.close();
        listener(vec![change("b", ChangeOperation::Add)]);
        assert!(first.recv().await.is_none());

        let mut second = inbox.open();
        listener(vec![change("c", ChangeOperation::Add)]);
        assert_eq!(second.recv().await.unwrap()[0].trigger_id, "c");
    }
}
