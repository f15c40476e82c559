//! Time-series query engine adapter (Prometheus HTTP API).
//!
//! Every external condition of a trigger whose alerter id is `prometheus`
//! becomes one instant query per tick. Each returned series becomes one
//! structured event carrying the series labels as context.

pub mod client;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use tracing::{debug, warn};
use uuid::Uuid;

use alerter_core::{
    CanonicalRecord, EventPayload, ExternalCondition, IntervalSpec, Properties, TriggerSnapshot,
};
use alerter_scheduler::{EndpointAdapter, FetchWindow};

pub use client::{HttpPromApi, PromApi, QueryData, QueryResponse, VectorSample};

use crate::error::AdapterError;
use crate::http::Endpoint;
use crate::settings::connector_default;

pub const CONNECTOR: &str = "prometheus";
/// Marker tag, condition alerter id, and event data source.
pub const ALERTER_ID: &str = "prometheus";
pub const DEFAULT_URL: &str = "http://localhost:9090";
pub const CONTEXT_URL: &str = "prometheus.url";
pub const CONTEXT_FREQUENCY: &str = "prometheus.frequency";
pub const DEFAULT_FREQUENCY_SECS: u32 = 120;

#[derive(Debug, Clone)]
pub struct QueryEngineConfig {
    pub endpoint: Endpoint,
    pub conditions: Vec<ExternalCondition>,
}

/// One series from one condition's query.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionSample {
    pub data_id: String,
    pub sample: VectorSample,
}

pub struct QueryEngineAdapter {
    api: Arc<dyn PromApi>,
}

impl QueryEngineAdapter {
    pub fn new(api: Arc<dyn PromApi>) -> Self {
        Self { api }
    }

    pub fn http() -> Result<Self, AdapterError> {
        Ok(Self::new(Arc::new(HttpPromApi::new()?)))
    }

    /// Samples for one condition. Envelopes that are not a successful vector
    /// are logged and yield nothing.
    async fn evaluate(
        &self,
        endpoint: &Endpoint,
        condition: &ExternalCondition,
    ) -> Result<Vec<ConditionSample>, AdapterError> {
        let response = self.api.instant_query(endpoint, &condition.expression).await?;
        if response.status != "success" {
            warn!(
                expression = %condition.expression,
                status = %response.status,
                error = response.error.as_deref().unwrap_or(""),
                "query did not succeed, skipping condition"
            );
            return Ok(Vec::new());
        }
        let Some(data) = response.data else {
            warn!(expression = %condition.expression, "successful response without data");
            return Ok(Vec::new());
        };
        if data.result_type != "vector" {
            warn!(
                expression = %condition.expression,
                result_type = %data.result_type,
                "unsupported result type, only vector is handled"
            );
            return Ok(Vec::new());
        }
        Ok(data
            .result
            .into_iter()
            .map(|sample| ConditionSample {
                data_id: condition.data_id.clone(),
                sample,
            })
            .collect())
    }
}

#[async_trait]
impl EndpointAdapter for QueryEngineAdapter {
    type Config = QueryEngineConfig;
    type QuerySet = Vec<ExternalCondition>;
    type RawItem = ConditionSample;
    type Error = AdapterError;

    fn name(&self) -> &str {
        CONNECTOR
    }

    fn marker_tag(&self) -> &str {
        ALERTER_ID
    }

    /// `prometheus.frequency` (seconds) wins over `interval`.
    fn interval(&self, trigger: &TriggerSnapshot, fallback: IntervalSpec) -> IntervalSpec {
        if let Some(raw) = trigger.context_value(CONTEXT_FREQUENCY) {
            match raw.trim().parse::<u32>() {
                Ok(secs) if secs > 0 => return IntervalSpec::seconds(secs),
                _ => warn!(trigger = %trigger.key(), frequency = raw, "invalid frequency, ignoring"),
            }
        }
        match trigger.context_value(alerter_scheduler::INTERVAL_KEY) {
            Some(raw) => IntervalSpec::parse_or(Some(raw), fallback),
            None => IntervalSpec::seconds(DEFAULT_FREQUENCY_SECS),
        }
    }

    fn configure(&self, trigger: &TriggerSnapshot, defaults: &Properties) -> Result<QueryEngineConfig, AdapterError> {
        let url = match trigger.context_value(CONTEXT_URL) {
            Some(url) => url.to_string(),
            None => connector_default(defaults, CONNECTOR, "url", DEFAULT_URL),
        };
        Ok(QueryEngineConfig {
            endpoint: Endpoint::new(url),
            conditions: trigger.conditions.clone(),
        })
    }

    async fn resolve_selectors(&self, config: &QueryEngineConfig) -> Result<Vec<ExternalCondition>, AdapterError> {
        let conditions: Vec<ExternalCondition> = config
            .conditions
            .iter()
            .filter(|c| c.alerter_id == ALERTER_ID)
            .cloned()
            .collect();
        debug!(conditions = conditions.len(), "query conditions selected");
        Ok(conditions)
    }

    async fn fetch(
        &self,
        config: &QueryEngineConfig,
        conditions: &Vec<ExternalCondition>,
        _window: &FetchWindow,
    ) -> Result<Vec<ConditionSample>, AdapterError> {
        let results = join_all(conditions.iter().map(|c| self.evaluate(&config.endpoint, c))).await;

        let mut samples = Vec::new();
        for (condition, result) in conditions.iter().zip(results) {
            match result {
                Ok(found) => samples.extend(found),
                Err(e) => warn!(expression = %condition.expression, error = %e, "query failed"),
            }
        }
        Ok(samples)
    }

    fn map(&self, _config: &QueryEngineConfig, item: ConditionSample) -> Option<CanonicalRecord> {
        let event = EventPayload {
            id: Uuid::new_v4().to_string(),
            data_source: ALERTER_ID.to_string(),
            category: ALERTER_ID.to_string(),
            text: item.sample.render_value(),
            tags: HashMap::new(),
        };
        let mut record = CanonicalRecord::event(item.data_id, Utc::now(), event);
        record.context = item.sample.metric;
        Some(record)
    }
}
