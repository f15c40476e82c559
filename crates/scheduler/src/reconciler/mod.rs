//! [`Reconciler`]: keeps exactly one scheduled job per active trigger.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, info, warn};

use alerter_core::{IntervalSpec, Properties, RecordSink, TriggerKey};

use crate::active::ActiveTriggerSet;
use crate::adapter::EndpointAdapter;
use crate::job::ScheduledJobHandle;
use crate::task::QueryTask;


/// What one reconciliation pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Keys that were active but had no job.
    pub added: usize,
    /// Keys that had a job and are still active; their job was replaced.
    pub updated: usize,
    /// Keys that had a job but are no longer active.
    pub removed: usize,
}

impl ReconcileReport {
    pub fn scheduled(&self) -> usize {
        self.added + self.updated
    }

    pub fn canceled(&self) -> usize {
        self.removed + self.updated
    }
}

/// Diffs the active trigger set against running jobs.
///
/// Passes are serialized by the job-map lock, and each pass reads the active
/// set only after taking it, so the last pass to run always sees the latest
/// set. Every key still active is cancelled and rescheduled, which picks up
/// snapshot changes without comparing snapshots.
pub struct Reconciler<A: EndpointAdapter> {
    adapter: Arc<A>,
    active: Arc<ActiveTriggerSet>,
    sink: Arc<dyn RecordSink>,
    defaults: Arc<Properties>,
    permits: Arc<Semaphore>,
    default_interval: IntervalSpec,
    jobs: Mutex<HashMap<TriggerKey, ScheduledJobHandle>>,
    closed: AtomicBool,
}

impl<A: EndpointAdapter> Reconciler<A> {
    pub fn new(
        adapter: Arc<A>,
        active: Arc<ActiveTriggerSet>,
        sink: Arc<dyn RecordSink>,
        defaults: Arc<Properties>,
        pool_size: usize,
        default_interval: IntervalSpec,
    ) -> Self {
        Self {
            adapter,
            active,
            sink,
            defaults,
            permits: Arc::new(Semaphore::new(pool_size.max(1))),
            default_interval,
            jobs: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub async fn reconcile(&self) -> ReconcileReport {
        let mut jobs = self.jobs.lock().await;
        if self.closed.load(Ordering::SeqCst) {
            debug!(connector = %self.adapter.name(), "reconciler closed, skipping pass");
            return ReconcileReport::default();
        }

        let active = self.active.snapshot();
        let existing: HashSet<TriggerKey> = jobs.keys().cloned().collect();
        let current: HashSet<TriggerKey> = active.keys().cloned().collect();

        let mut report = ReconcileReport::default();
        for key in existing.difference(&current) {
            if let Some(handle) = jobs.remove(key) {
                handle.cancel();
                report.removed += 1;
                debug!(connector = %self.adapter.name(), trigger = %key, "job canceled");
            }
        }

        for (key, trigger) in active {
            let replaced = jobs.remove(&key).map(|old| old.cancel()).is_some();

            let interval = self.adapter.interval(&trigger, self.default_interval);
            let task = Arc::new(QueryTask::new(
                trigger,
                self.adapter.clone(),
                self.defaults.clone(),
                self.sink.clone(),
                interval,
            ));
            jobs.insert(key.clone(), ScheduledJobHandle::spawn(task, self.permits.clone()));

            if replaced {
                report.updated += 1;
            } else {
                report.added += 1;
            }
            debug!(connector = %self.adapter.name(), trigger = %key, %interval, replaced, "job scheduled");
        }

        info!(
            connector = %self.adapter.name(),
            added = report.added,
            updated = report.updated,
            removed = report.removed,
            jobs = jobs.len(),
            "reconciled scheduled jobs"
        );
        report
    }

    /// Accept passes again after [`shutdown`](Self::shutdown).
    pub fn reopen(&self) {
        self.closed.store(false, Ordering::SeqCst);
    }

    pub async fn job_count(&self) -> usize {
        self.jobs.lock().await.len()
    }

    pub async fn scheduled_keys(&self) -> Vec<TriggerKey> {
        let mut keys: Vec<TriggerKey> = self.jobs.lock().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub async fn interval_of(&self, key: &TriggerKey) -> Option<IntervalSpec> {
        self.jobs.lock().await.get(key).map(ScheduledJobHandle::interval)
    }

    /// Cancel every job and wait up to `timeout` for in-flight ticks.
    ///
    /// Jobs still running at the deadline are aborted. Later passes become
    /// no-ops. Returns the number of aborted jobs.
    pub async fn shutdown(&self, timeout: Duration) -> usize {
        let drained: Vec<ScheduledJobHandle> = {
            let mut jobs = self.jobs.lock().await;
            self.closed.store(true, Ordering::SeqCst);
            jobs.drain().map(|(_, handle)| handle).collect()
        };
        let total = drained.len();
        let tasks: Vec<_> = drained.into_iter().map(ScheduledJobHandle::into_task).collect();

        let deadline = tokio::time::Instant::now() + timeout;
        let mut aborted = 0;
        for mut task in tasks {
            if tokio::time::timeout_at(deadline, &mut task).await.is_err() {
                task.abort();
                aborted += 1;
            }
        }

        if aborted > 0 {
            warn!(connector = %self.adapter.name(), aborted, total, "jobs aborted at shutdown deadline");
        } else {
            info!(connector = %self.adapter.name(), total, "all jobs stopped");
        }
        aborted
    }
}
