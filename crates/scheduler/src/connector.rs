//! [`Connector`]: one endpoint adapter wired to the shared collaborators.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use alerter_core::{ChangeFeed, DefinitionsLookup, Properties, RecordSink};

use crate::active::ActiveTriggerSet;
use crate::adapter::EndpointAdapter;
use crate::config::ConnectorConfig;
use crate::error::SchedulerError;
use crate::reconciler::Reconciler;
use crate::subscriber::{ChangeFeedSubscriber, ChangeInbox};

/// A startable polling connector, independent of its adapter type.
#[async_trait]
pub trait Alerter: Send + Sync {
    fn name(&self) -> &str;

    async fn start(&self) -> Result<(), SchedulerError>;

    /// Stop polling. Safe to call when not running.
    async fn stop(&self) -> Result<(), SchedulerError>;
}

/// Services every connector in a process shares.
#[derive(Clone)]
pub struct Collaborators {
    pub definitions: Arc<dyn DefinitionsLookup>,
    pub feed: Arc<dyn ChangeFeed>,
    pub sink: Arc<dyn RecordSink>,
    pub properties: Arc<Properties>,
}

struct Running {
    shutdown: watch::Sender<bool>,
    refresh: JoinHandle<()>,
}

pub struct Connector<A: EndpointAdapter> {
    name: String,
    config: ConnectorConfig,
    feed: Arc<dyn ChangeFeed>,
    sink: Arc<dyn RecordSink>,
    active: Arc<ActiveTriggerSet>,
    reconciler: Arc<Reconciler<A>>,
    subscriber: Arc<ChangeFeedSubscriber<A>>,
    inbox: ChangeInbox,
    /// Set once the inbox listener is registered with the feed.
    listening: AtomicBool,
    running: Mutex<Option<Running>>,
}

impl<A: EndpointAdapter> Connector<A> {
    pub fn new(adapter: A, config: ConnectorConfig, collaborators: Collaborators) -> Self {
        let adapter = Arc::new(adapter);
        let active = Arc::new(ActiveTriggerSet::new());
        let reconciler = Arc::new(Reconciler::new(
            adapter.clone(),
            active.clone(),
            collaborators.sink.clone(),
            collaborators.properties.clone(),
            config.resolved_pool_size(),
            config.default_interval,
        ));
        let subscriber = Arc::new(ChangeFeedSubscriber::new(
            adapter.clone(),
            collaborators.definitions.clone(),
            active.clone(),
            reconciler.clone(),
        ));

        Self {
            name: adapter.name().to_string(),
            config,
            feed: collaborators.feed,
            sink: collaborators.sink,
            active,
            reconciler,
            subscriber,
            inbox: ChangeInbox::new(),
            listening: AtomicBool::new(false),
            running: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ConnectorConfig {
        &self.config
    }

    pub fn active(&self) -> &Arc<ActiveTriggerSet> {
        &self.active
    }

    pub fn reconciler(&self) -> &Arc<Reconciler<A>> {
        &self.reconciler
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }
}

#[async_trait]
impl<A: EndpointAdapter> Alerter for Connector<A> {
    fn name(&self) -> &str {
        &self.name
    }

    /// Check the sink, subscribe to changes, load the initial triggers, then
    /// start draining queued change batches.
    ///
    /// Batches arriving during the initial load queue up and are applied
    /// after it, so a change is never overwritten by an older scan result.
    /// The feed listener is registered on the first start only.
    async fn start(&self) -> Result<(), SchedulerError> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Err(SchedulerError::AlreadyRunning(self.name.clone()));
        }

        self.sink.check().await.map_err(SchedulerError::SinkUnavailable)?;
        self.reconciler.reopen();

        let rx = self.inbox.open();
        if !self.listening.load(Ordering::SeqCst) {
            if let Err(e) = self.feed.register_listener(self.inbox.listener()).await {
                self.inbox.close();
                return Err(SchedulerError::FeedRegistration(e));
            }
            self.listening.store(true, Ordering::SeqCst);
        }

        let report = match self.subscriber.bootstrap().await {
            Ok(report) => report,
            Err(e) => {
                // Nothing may stay scheduled after a failed start.
                self.inbox.close();
                self.reconciler.shutdown(self.config.shutdown_timeout()).await;
                self.active.clear();
                return Err(SchedulerError::Bootstrap(e));
            }
        };

        let (shutdown, shutdown_rx) = watch::channel(false);
        let refresh = self.subscriber.clone().spawn_refresh_worker(rx, shutdown_rx);
        *running = Some(Running { shutdown, refresh });

        info!(
            connector = %self.name,
            triggers = report.scheduled(),
            pool = self.config.resolved_pool_size(),
            "connector started"
        );
        Ok(())
    }

    async fn stop(&self) -> Result<(), SchedulerError> {
        let Some(running) = self.running.lock().await.take() else {
            debug!(connector = %self.name, "stop called on idle connector");
            return Ok(());
        };

        self.inbox.close();
        let _ = running.shutdown.send(true);
        if let Err(e) = running.refresh.await {
            warn!(connector = %self.name, error = %e, "refresh worker ended abnormally");
        }

        let aborted = self.reconciler.shutdown(self.config.shutdown_timeout()).await;
        self.active.clear();
        info!(connector = %self.name, aborted, "connector stopped");
        Ok(())
    }
}
