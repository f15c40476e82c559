use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::OnceCell;
use tracing::{debug, error, warn};

use alerter_core::{CanonicalRecord, IntervalSpec, Properties, RecordSink, TriggerKey, TriggerSnapshot};

use crate::adapter::{EndpointAdapter, FetchWindow};

/// Stage at which a tick gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickStage {
    Configure,
    Resolve,
    Fetch,
    Sink,
    Panic,
}

impl fmt::Display for TickStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Configure => "configure",
            Self::Resolve => "resolve",
            Self::Fetch => "fetch",
            Self::Sink => "sink",
            Self::Panic => "panic",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Records were accepted by the sink.
    Delivered(usize),
    /// The fetch succeeded but produced nothing to send.
    Empty,
    Failed(TickStage),
}

/// Periodic polling unit for one trigger.
///
/// Errors are logged and swallowed; the next tick simply tries again.
pub struct QueryTask<A: EndpointAdapter> {
    trigger: Arc<TriggerSnapshot>,
    adapter: Arc<A>,
    defaults: Arc<Properties>,
    sink: Arc<dyn RecordSink>,
    interval: IntervalSpec,
    selectors: OnceCell<A::QuerySet>,
}

impl<A: EndpointAdapter> QueryTask<A> {
    pub fn new(
        trigger: Arc<TriggerSnapshot>,
        adapter: Arc<A>,
        defaults: Arc<Properties>,
        sink: Arc<dyn RecordSink>,
        interval: IntervalSpec,
    ) -> Self {
        Self {
            trigger,
            adapter,
            defaults,
            sink,
            interval,
            selectors: OnceCell::new(),
        }
    }

    pub fn key(&self) -> TriggerKey {
        self.trigger.key()
    }

    pub fn interval(&self) -> IntervalSpec {
        self.interval
    }

    pub fn selectors_resolved(&self) -> bool {
        self.selectors.initialized()
    }

    /// Run one tick, converting a panic inside the adapter into a failure.
    pub async fn tick(&self) -> TickOutcome {
        match AssertUnwindSafe(self.run_once()).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(_) => {
                error!(
                    connector = %self.adapter.name(),
                    tenant_id = %self.trigger.tenant_id,
                    trigger_id = %self.trigger.id,
                    "query tick panicked"
                );
                TickOutcome::Failed(TickStage::Panic)
            }
        }
    }

    /// configure → resolve (first time only) → fetch → map → sink.
    pub async fn run_once(&self) -> TickOutcome {
        let connector = self.adapter.name();
        let tenant_id = self.trigger.tenant_id.as_str();
        let trigger_id = self.trigger.id.as_str();

        let config = match self.adapter.configure(&self.trigger, &self.defaults) {
            Ok(config) => config,
            Err(e) => {
                warn!(connector, tenant_id, trigger_id, error = %e, "invalid trigger configuration");
                return TickOutcome::Failed(TickStage::Configure);
            }
        };

        let query_set = match self
            .selectors
            .get_or_try_init(|| self.adapter.resolve_selectors(&config))
            .await
        {
            Ok(query_set) => query_set,
            Err(e) => {
                warn!(connector, tenant_id, trigger_id, error = %e, "selector resolution failed");
                return TickOutcome::Failed(TickStage::Resolve);
            }
        };

        let window = FetchWindow::ending_now(self.interval);
        let items = match self.adapter.fetch(&config, query_set, &window).await {
            Ok(items) => items,
            Err(e) => {
                warn!(connector, tenant_id, trigger_id, error = %e, "fetch failed");
                return TickOutcome::Failed(TickStage::Fetch);
            }
        };

        let records: Vec<CanonicalRecord> = items
            .into_iter()
            .filter_map(|item| self.adapter.map(&config, item))
            .map(|record| record.with_tenant(tenant_id))
            .collect();
        if records.is_empty() {
            debug!(connector, tenant_id, trigger_id, "no records this tick");
            return TickOutcome::Empty;
        }

        let count = records.len();
        match self.sink.send(records).await {
            Ok(()) => {
                debug!(connector, tenant_id, trigger_id, count, "records delivered");
                TickOutcome::Delivered(count)
            }
            Err(e) => {
                warn!(connector, tenant_id, trigger_id, count, error = %e, "sink rejected records");
                TickOutcome::Failed(TickStage::Sink)
            }
        }
    }
}
