use std::sync::Arc;

use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use alerter_core::{IntervalSpec, TriggerKey};

use crate::adapter::EndpointAdapter;
use crate::task::QueryTask;

/// A running periodic job for one trigger.
///
/// Dropping the handle cancels the job the same way [`cancel`](Self::cancel) does.
#[derive(Debug)]
pub struct ScheduledJobHandle {
    key: TriggerKey,
    interval: IntervalSpec,
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ScheduledJobHandle {
    /// Start firing `task` every `task.interval()`, first tick immediately.
    ///
    /// Each tick waits for a permit from `permits` before running. Ticks of
    /// one job never overlap; periods missed by a slow tick are skipped,
    /// not replayed.
    pub fn spawn<A: EndpointAdapter>(task: Arc<QueryTask<A>>, permits: Arc<Semaphore>) -> Self {
        let key = task.key();
        let interval = task.interval();
        let (cancel, mut canceled) = watch::channel(false);

        let job_key = key.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.as_duration());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = canceled.changed() => break,
                    _ = ticker.tick() => {}
                }
                let permit = tokio::select! {
                    biased;
                    _ = canceled.changed() => break,
                    permit = permits.clone().acquire_owned() => match permit {
                        Ok(p) => p,
                        Err(_) => break,
                    },
                };
                task.tick().await;
                drop(permit);
            }
            debug!(trigger = %job_key, "job loop exited");
        });

        Self {
            key,
            interval,
            cancel,
            task: handle,
        }
    }

    pub fn key(&self) -> &TriggerKey {
        &self.key
    }

    pub fn interval(&self) -> IntervalSpec {
        self.interval
    }

    /// Suppress further ticks. Does not wait; a tick already running finishes.
    pub fn cancel(&self) {
        let _ = self.cancel.send(true);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancel and hand back the task so the caller can await it.
    pub fn into_task(self) -> JoinHandle<()> {
        self.cancel();
        self.task
    }
}
