use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::debug;

use alerter_adapters::http::build_client;
use alerter_core::{CollaboratorError, DefinitionsLookup, TriggerSnapshot};

use crate::error::WorkerError;

/// [`DefinitionsLookup`] backed by the definitions service REST API.
#[derive(Debug, Clone)]
pub struct HttpDefinitions {
    client: Client,
    base_url: String,
}

impl HttpDefinitions {
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

fn lookup_error(e: impl std::fmt::Display) -> CollaboratorError {
    CollaboratorError::Lookup(e.to_string())
}

#[async_trait]
impl DefinitionsLookup for HttpDefinitions {
    async fn get_trigger(
        &self,
        tenant_id: &str,
        trigger_id: &str,
    ) -> Result<Option<TriggerSnapshot>, CollaboratorError> {
        let url = format!("{}/tenants/{tenant_id}/triggers/{trigger_id}", self.base_url);
        let response = self.client.get(&url).send().await.map_err(lookup_error)?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!(tenant_id, trigger_id, "trigger no longer exists");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(CollaboratorError::Lookup(format!("{url} returned {status}")));
        }
        response.json().await.map(Some).map_err(lookup_error)
    }

    async fn all_triggers_by_tag(&self, tag: &str) -> Result<Vec<TriggerSnapshot>, CollaboratorError> {
        let url = format!("{}/triggers", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("tag", tag)])
            .send()
            .await
            .map_err(lookup_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(CollaboratorError::Lookup(format!("{url}?tag={tag} returned {status}")));
        }
        let triggers: Vec<TriggerSnapshot> = response.json().await.map_err(lookup_error)?;
        debug!(tag, count = triggers.len(), "triggers listed");
        Ok(triggers)
    }
}
