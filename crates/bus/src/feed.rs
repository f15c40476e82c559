//! Trigger change notifications over ZeroMQ.
//!
//! [`ChangePublisher`] is the producing side used by whatever owns trigger
//! definitions. [`ZmqChangeFeed`] is the consuming side: it implements the
//! core [`ChangeFeed`] boundary so connectors never see sockets.

use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use alerter_core::{ChangeFeed, ChangeListener, CollaboratorError, TriggerChange};

use crate::error::BusError;
use crate::message::Message;
use crate::messages::events::TriggerChangeBatch;
use crate::messages::topics;
use crate::pubsub::ZmqSubscriber;
use crate::traits::{EventPublisher, EventSubscriber};
use crate::transport::Transport;

/// Delay before receiving again after a socket error.
const RECV_BACKOFF: Duration = Duration::from_millis(100);

// ── Publisher side ───────────────────────────────────────────────────

pub struct ChangePublisher {
    publisher: Arc<dyn EventPublisher>,
}

impl ChangePublisher {
    pub fn new(publisher: Arc<dyn EventPublisher>) -> Self {
        Self { publisher }
    }

    /// Publish one batch. Empty batches are not sent.
    pub async fn publish_changes(&self, changes: Vec<TriggerChange>) -> Result<(), BusError> {
        if changes.is_empty() {
            return Ok(());
        }
        let count = changes.len();
        let message = Message::new(topics::TRIGGER_CHANGED, &TriggerChangeBatch { changes })?;
        self.publisher.publish(message).await?;
        debug!(changes = count, "published trigger change batch");
        Ok(())
    }
}

// ── Subscriber side ──────────────────────────────────────────────────

/// Receives [`TriggerChangeBatch`]es and fans each one out to every
/// registered listener.
pub struct ZmqChangeFeed {
    subscriber: Arc<dyn EventSubscriber>,
    listeners: Arc<RwLock<Vec<ChangeListener>>>,
    shutdown: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ZmqChangeFeed {
    pub fn new(subscriber: Arc<dyn EventSubscriber>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            subscriber,
            listeners: Arc::new(RwLock::new(Vec::new())),
            shutdown,
            task: Mutex::new(None),
        }
    }

    /// Connect a SUB socket to the publisher at `transport`.
    pub async fn connect(transport: &Transport) -> Result<Self, BusError> {
        let subscriber = ZmqSubscriber::connect(transport).await?;
        Ok(Self::new(Arc::new(subscriber)))
    }

    /// Subscribe to change batches and start the receive loop.
    pub async fn start(&self) -> Result<(), BusError> {
        self.subscriber.subscribe(topics::TRIGGER_CHANGED).await?;

        let subscriber = self.subscriber.clone();
        let listeners = self.listeners.clone();
        let shutdown = self.shutdown.subscribe();
        let handle = tokio::spawn(receive_loop(subscriber, listeners, shutdown));

        let previous = self
            .task
            .lock()
            .expect("feed task lock poisoned")
            .replace(handle);
        if let Some(old) = previous {
            old.abort();
        }
        info!(topic = topics::TRIGGER_CHANGED, "change feed started");
        Ok(())
    }

    /// Stop the receive loop and wait for it to exit.
    pub async fn stop(&self) {
        let _ = self.shutdown.send(true);
        let handle = self.task.lock().expect("feed task lock poisoned").take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        info!("change feed stopped");
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().expect("listeners lock poisoned").len()
    }
}

#[async_trait]
impl ChangeFeed for ZmqChangeFeed {
    async fn register_listener(&self, listener: ChangeListener) -> Result<(), CollaboratorError> {
        self.listeners
            .write()
            .map_err(|_| CollaboratorError::Feed("listener registry poisoned".into()))?
            .push(listener);
        Ok(())
    }
}

async fn receive_loop(
    subscriber: Arc<dyn EventSubscriber>,
    listeners: Arc<RwLock<Vec<ChangeListener>>>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            result = subscriber.recv() => match result {
                Ok(message) => dispatch(&listeners, &message),
                Err(e) => {
                    warn!(error = %e, "change feed receive failed");
                    tokio::time::sleep(RECV_BACKOFF).await;
                }
            },
        }
    }
    debug!("change feed receive loop exited");
}

fn dispatch(listeners: &RwLock<Vec<ChangeListener>>, message: &Message) {
    if message.topic != topics::TRIGGER_CHANGED {
        warn!(topic = %message.topic, "unexpected topic on change feed");
        return;
    }
    let batch: TriggerChangeBatch = match message.decode() {
        Ok(batch) => batch,
        Err(e) => {
            warn!(correlation_id = %message.correlation_id, error = %e, "undecodable change batch");
            return;
        }
    };
    debug!(
        correlation_id = %message.correlation_id,
        changes = batch.changes.len(),
        "delivering change batch"
    );

    // Clone the list so listeners run without the registry lock held.
    let targets: Vec<ChangeListener> = match listeners.read() {
        Ok(guard) => guard.clone(),
        Err(_) => {
            warn!("listener registry poisoned, dropping batch");
            return;
        }
    };
    for listener in targets {
        listener(batch.changes.clone());
    }
}
