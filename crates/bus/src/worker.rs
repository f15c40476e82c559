//! Long-running worker lifecycle.
//!
//! [`WorkerRunner`] starts a [`Worker`], publishes heartbeats while it runs,
//! waits for SIGINT/SIGTERM or a programmatic shutdown, then stops the worker
//! within a bounded time.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tracing::{info, warn};

use crate::message::Message;
use crate::messages::events::{WorkerHealth, WorkerStatus};
use crate::messages::topics::WORKER_HEALTH;
use crate::traits::EventPublisher;

// ── Worker trait ─────────────────────────────────────────────────────

#[async_trait]
pub trait Worker: Send + Sync {
    type Error: std::fmt::Display + Send;

    async fn start(&self) -> Result<(), Self::Error>;

    /// Drain in-flight work and release resources.
    async fn stop(&self) -> Result<(), Self::Error>;

    fn name(&self) -> &str;

    /// Names reported in heartbeats.
    fn components(&self) -> Vec<String> {
        Vec::new()
    }
}

// ── WorkerBuilder ────────────────────────────────────────────────────

pub struct WorkerBuilder {
    name: String,
    health_interval: Duration,
    shutdown_timeout: Duration,
}

impl WorkerBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            health_interval: Duration::from_secs(30),
            shutdown_timeout: Duration::from_secs(10),
        }
    }

    /// Interval between heartbeats (default: 30s).
    pub fn health_interval(mut self, interval: Duration) -> Self {
        self.health_interval = interval;
        self
    }

    /// Upper bound on `Worker::stop` (default: 10s).
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn build(self) -> WorkerRunnerConfig {
        WorkerRunnerConfig {
            name: self.name,
            health_interval: self.health_interval,
            shutdown_timeout: self.shutdown_timeout,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkerRunnerConfig {
    pub name: String,
    pub health_interval: Duration,
    pub shutdown_timeout: Duration,
}

// ── WorkerRunner ─────────────────────────────────────────────────────

pub struct WorkerRunner;

impl WorkerRunner {
    /// Run `worker` until an OS signal or `shutdown_notify` fires.
    ///
    /// Heartbeats are published only when a `publisher` is given. A failing
    /// `start()` is returned to the caller without waiting for shutdown.
    pub async fn run<W: Worker + ?Sized>(
        worker: Arc<W>,
        publisher: Option<Arc<dyn EventPublisher>>,
        config: WorkerRunnerConfig,
        shutdown_notify: Option<Arc<Notify>>,
    ) -> Result<(), W::Error> {
        let name = config.name.clone();
        info!(worker = %name, "starting worker");
        worker.start().await?;
        info!(worker = %name, "worker started");

        let components = worker.components();
        let health_handle = publisher.clone().map(|publisher| {
            let name = name.clone();
            let components = components.clone();
            tokio::spawn(async move {
                health_loop(&*publisher, &name, &components, config.health_interval).await;
            })
        });

        wait_for_shutdown(shutdown_notify).await;
        info!(worker = %name, "shutdown signal received");

        if let Some(handle) = health_handle {
            handle.abort();
        }

        info!(worker = %name, timeout = ?config.shutdown_timeout, "stopping worker");
        match tokio::time::timeout(config.shutdown_timeout, worker.stop()).await {
            Ok(Ok(())) => info!(worker = %name, "worker stopped gracefully"),
            Ok(Err(e)) => warn!(worker = %name, error = %e, "worker stop returned error"),
            Err(_) => warn!(worker = %name, "worker stop timed out, forcing shutdown"),
        }

        if let Some(publisher) = publisher {
            publish_health(&*publisher, &name, &components, WorkerStatus::Unhealthy).await;
        }
        info!(worker = %name, "worker shutdown complete");
        Ok(())
    }
}

/// Heartbeat immediately, then once per `interval`.
async fn health_loop(
    publisher: &dyn EventPublisher,
    name: &str,
    components: &[String],
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        publish_health(publisher, name, components, WorkerStatus::Healthy).await;
    }
}

async fn publish_health(
    publisher: &dyn EventPublisher,
    name: &str,
    components: &[String],
    status: WorkerStatus,
) {
    let health = WorkerHealth {
        worker_id: name.to_string(),
        status,
        connectors: components.to_vec(),
    };
    match Message::new(WORKER_HEALTH, &health) {
        Ok(msg) => {
            if let Err(e) = publisher.publish(msg).await {
                warn!(worker = %name, error = %e, "failed to publish heartbeat");
            }
        }
        Err(e) => warn!(worker = %name, error = %e, "failed to encode heartbeat"),
    }
}

async fn wait_for_shutdown(external: Option<Arc<Notify>>) {
    match external {
        Some(notify) => {
            tokio::select! {
                _ = os_signal() => {}
                _ = notify.notified() => {}
            }
        }
        None => os_signal().await,
    }
}

/// SIGINT or SIGTERM on Unix, Ctrl+C elsewhere.
async fn os_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match (signal(SignalKind::interrupt()), signal(SignalKind::terminate())) {
            (Ok(mut sigint), Ok(mut sigterm)) => {
                tokio::select! {
                    _ = sigint.recv() => {}
                    _ = sigterm.recv() => {}
                }
            }
            _ => {
                warn!("could not register unix signal handlers, falling back to ctrl_c");
                ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    ctrl_c().await;
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "ctrl_c listener failed, waiting forever");
        std::future::pending::<()>().await;
    }
}
