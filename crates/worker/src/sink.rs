use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use alerter_adapters::http::build_client;
use alerter_core::{CanonicalRecord, CollaboratorError, RecordSink};

use crate::error::WorkerError;

/// [`RecordSink`] posting record batches to the ingestion service.
#[derive(Debug, Clone)]
pub struct HttpSink {
    client: Client,
    base_url: String,
}

impl HttpSink {
    pub fn new(base_url: &str) -> Result<Self, WorkerError> {
        Ok(Self::with_client(build_client()?, base_url))
    }

    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl RecordSink for HttpSink {
    async fn send(&self, records: Vec<CanonicalRecord>) -> Result<(), CollaboratorError> {
        if records.is_empty() {
            return Ok(());
        }
        let url = format!("{}/ingest", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&records)
            .send()
            .await
            .map_err(|e| CollaboratorError::Sink(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CollaboratorError::Sink(format!("{url} returned {status}: {body}")));
        }
        debug!(count = records.len(), "records delivered");
        Ok(())
    }

    async fn check(&self) -> Result<(), CollaboratorError> {
        let url = format!("{}/status", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) if response.status().is_success() => Ok(()),
            Ok(response) => Err(CollaboratorError::Unavailable(format!(
                "ingestion sink ({url} returned {})",
                response.status()
            ))),
            Err(e) => Err(CollaboratorError::Unavailable(format!("ingestion sink ({e})"))),
        }
    }
}
