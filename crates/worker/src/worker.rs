use async_trait::async_trait;
use futures::future::join_all;
use tracing::{error, info, warn};

use alerter_bus::Worker;
use alerter_scheduler::Alerter;

use crate::error::WorkerError;

/// Owns the enabled alerters and drives them as one bus worker.
pub struct AlerterWorker {
    name: String,
    alerters: Vec<Box<dyn Alerter>>,
}

impl AlerterWorker {
    pub fn new(name: impl Into<String>, alerters: Vec<Box<dyn Alerter>>) -> Self {
        Self {
            name: name.into(),
            alerters,
        }
    }
}

#[async_trait]
impl Worker for AlerterWorker {
    type Error = WorkerError;

    /// Start every alerter in order. When one fails, those already started
    /// are stopped again and the failure is returned.
    async fn start(&self) -> Result<(), WorkerError> {
        if self.alerters.is_empty() {
            warn!(worker = %self.name, "no alerters enabled");
        }
        for (i, alerter) in self.alerters.iter().enumerate() {
            if let Err(e) = alerter.start().await {
                error!(alerter = alerter.name(), error = %e, "alerter failed to start");
                for started in self.alerters[..i].iter().rev() {
                    if let Err(e) = started.stop().await {
                        warn!(alerter = started.name(), error = %e, "stop after failed start");
                    }
                }
                return Err(e.into());
            }
            info!(alerter = alerter.name(), "alerter started");
        }
        Ok(())
    }

    /// Stop every alerter concurrently, so each drains within its own
    /// shutdown timeout regardless of the others.
    async fn stop(&self) -> Result<(), WorkerError> {
        let results = join_all(self.alerters.iter().map(|a| a.stop())).await;
        for (alerter, result) in self.alerters.iter().zip(results) {
            match result {
                Ok(()) => info!(alerter = alerter.name(), "alerter stopped"),
                Err(e) => warn!(alerter = alerter.name(), error = %e, "alerter stop failed"),
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn components(&self) -> Vec<String> {
        self.alerters.iter().map(|a| a.name().to_string()).collect()
    }
}
