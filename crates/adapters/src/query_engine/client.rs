use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::Value;

use crate::error::AdapterError;
use crate::http::{build_client, read_json, Endpoint};

/// `/api/v1/query` response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryResponse {
    pub status: String,
    #[serde(default)]
    pub data: Option<QueryData>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryData {
    pub result_type: String,
    #[serde(default)]
    pub result: Vec<VectorSample>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VectorSample {
    /// Series labels.
    #[serde(default)]
    pub metric: HashMap<String, String>,
    /// `[unix_seconds, "value"]`.
    #[serde(default)]
    pub value: Vec<Value>,
}

impl VectorSample {
    /// The sample pair rendered as `[timestamp, value]`.
    pub fn render_value(&self) -> String {
        let parts: Vec<String> = self
            .value
            .iter()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect();
        format!("[{}]", parts.join(", "))
    }
}

#[async_trait]
pub trait PromApi: Send + Sync {
    async fn instant_query(&self, endpoint: &Endpoint, expression: &str) -> Result<QueryResponse, AdapterError>;
}

/// [`PromApi`] over the Prometheus HTTP API.
#[derive(Debug, Clone)]
pub struct HttpPromApi {
    client: Client,
}

impl HttpPromApi {
    pub fn new() -> Result<Self, AdapterError> {
        Ok(Self {
            client: build_client()?,
        })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PromApi for HttpPromApi {
    async fn instant_query(&self, endpoint: &Endpoint, expression: &str) -> Result<QueryResponse, AdapterError> {
        let response = endpoint
            .request(&self.client, Method::GET, "/api/v1/query")
            .query(&[("query", expression)])
            .send()
            .await?;
        read_json(response).await
    }
}
