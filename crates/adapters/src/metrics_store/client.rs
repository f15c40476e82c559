use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::AdapterError;
use crate::http::{build_client, read_json, Endpoint};

/// A series as listed by the metrics store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MetricRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Resource {
    /// Series name → series id.
    #[serde(default)]
    pub metrics: HashMap<String, String>,
}

/// One query issued per tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeriesQuery {
    Metric { name: String, id: String },
    Aggregate { name: String, function: String, ids: Vec<String> },
}

impl SeriesQuery {
    /// Data id of the records this query produces.
    pub fn name(&self) -> &str {
        match self {
            Self::Metric { name, .. } | Self::Aggregate { name, .. } => name,
        }
    }
}

/// A `[timestamp, granularity, value]` triple.
#[derive(Debug, Clone, PartialEq)]
pub struct Measure {
    pub timestamp: String,
    pub granularity: f64,
    pub value: f64,
}

impl Measure {
    /// Anything that is not a three-element `[string, number, number]` is skipped.
    pub fn from_json(raw: &Value) -> Option<Self> {
        match raw.as_array()?.as_slice() {
            [ts, granularity, value] => Some(Self {
                timestamp: ts.as_str()?.to_string(),
                granularity: granularity.as_f64()?,
                value: value.as_f64()?,
            }),
            _ => None,
        }
    }
}

/// Remote calls made by the metrics-store adapter.
#[async_trait]
pub trait MetricsApi: Send + Sync {
    /// Series named exactly `name`.
    async fn metrics_named(&self, endpoint: &Endpoint, name: &str) -> Result<Vec<MetricRef>, AdapterError>;

    async fn all_metrics(&self, endpoint: &Endpoint) -> Result<Vec<MetricRef>, AdapterError>;

    async fn search_resources(&self, endpoint: &Endpoint, query: &Value) -> Result<Vec<Resource>, AdapterError>;

    async fn measures(
        &self,
        endpoint: &Endpoint,
        query: &SeriesQuery,
        granularity: &str,
        start: DateTime<Utc>,
    ) -> Result<Vec<Measure>, AdapterError>;
}

/// [`MetricsApi`] over the Gnocchi v1 REST API.
#[derive(Debug, Clone)]
pub struct HttpMetricsApi {
    client: Client,
}

impl HttpMetricsApi {
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
impl MetricsApi for HttpMetricsApi {
    async fn metrics_named(&self, endpoint: &Endpoint, name: &str) -> Result<Vec<MetricRef>, AdapterError> {
        let response = endpoint
            .request(&self.client, Method::GET, "/v1/metric")
            .query(&[("name", name)])
            .send()
            .await?;
        read_json(response).await
    }

    async fn all_metrics(&self, endpoint: &Endpoint) -> Result<Vec<MetricRef>, AdapterError> {
        let response = endpoint
            .request(&self.client, Method::GET, "/v1/metric")
            .send()
            .await?;
        read_json(response).await
    }

    async fn search_resources(&self, endpoint: &Endpoint, query: &Value) -> Result<Vec<Resource>, AdapterError> {
        let response = endpoint
            .request(&self.client, Method::POST, "/v1/search/resource/generic")
            .json(query)
            .send()
            .await?;
        read_json(response).await
    }

    async fn measures(
        &self,
        endpoint: &Endpoint,
        query: &SeriesQuery,
        granularity: &str,
        start: DateTime<Utc>,
    ) -> Result<Vec<Measure>, AdapterError> {
        let start = start.timestamp().to_string();
        let request = match query {
            SeriesQuery::Metric { id, .. } => endpoint
                .request(&self.client, Method::GET, &format!("/v1/metric/{id}/measures"))
                .query(&[("granularity", granularity), ("start", start.as_str())]),
            SeriesQuery::Aggregate { function, ids, .. } => {
                let mut params = vec![("aggregation", function.as_str()), ("granularity", granularity)];
                params.extend(ids.iter().map(|id| ("metric", id.as_str())));
                params.push(("start", start.as_str()));
                endpoint
                    .request(&self.client, Method::GET, "/v1/aggregation/metric")
                    .query(&params)
            }
        };

        let raw: Vec<Value> = read_json(request.send().await?).await?;
        let measures: Vec<Measure> = raw.iter().filter_map(Measure::from_json).collect();
        debug!(series = %query.name(), received = raw.len(), kept = measures.len(), "measures fetched");
        Ok(measures)
    }
}
