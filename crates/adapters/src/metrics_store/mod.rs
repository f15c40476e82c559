//! Metrics-store adapter (Gnocchi-compatible).
//!
//! Selectors resolve a trigger's context into a `name → id` map once per
//! task; each tick then fetches measures for every series, or only for the
//! configured aggregates when there are any, over a small bounded fan-out.

pub mod aggregation;
pub mod client;
pub mod config;

#[cfg(test)]
mod tests;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use alerter_core::{CanonicalRecord, Properties, TriggerSnapshot};
use alerter_scheduler::{EndpointAdapter, FetchWindow};

pub use client::{HttpMetricsApi, Measure, MetricRef, MetricsApi, SeriesQuery};
pub use config::{MetricSelector, MetricsStoreConfig};

use crate::error::AdapterError;

pub const CONNECTOR: &str = "gnocchi";
pub const MARKER_TAG: &str = "Gnocchi";
/// Concurrent measure requests per tick.
pub const FETCH_CONCURRENCY: usize = 10;

/// A measure tagged with the series it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesMeasure {
    pub series: String,
    pub measure: Measure,
}

pub struct MetricsStoreAdapter {
    api: Arc<dyn MetricsApi>,
    concurrency: usize,
}

impl MetricsStoreAdapter {
    pub fn new(api: Arc<dyn MetricsApi>) -> Self {
        Self {
            api,
            concurrency: FETCH_CONCURRENCY,
        }
    }

    pub fn http() -> Result<Self, AdapterError> {
        Ok(Self::new(Arc::new(HttpMetricsApi::new()?)))
    }

    /// Resolve the selector into `series name → series id`.
    pub async fn resolve_names(&self, config: &MetricsStoreConfig) -> Result<BTreeMap<String, String>, AdapterError> {
        let endpoint = &config.endpoint;
        let resolved: BTreeMap<String, String> = match &config.selector {
            MetricSelector::Ids(ids) => ids.iter().map(|id| (id.clone(), id.clone())).collect(),

            MetricSelector::Names { names, resource_query: None } => {
                let mut found = BTreeMap::new();
                for name in names {
                    for metric in self.api.metrics_named(endpoint, name).await? {
                        if names.contains(&metric.name) {
                            found.insert(metric.name, metric.id);
                        }
                    }
                }
                found
            }

            MetricSelector::Pattern { regex, resource_query: None } => self
                .api
                .all_metrics(endpoint)
                .await?
                .into_iter()
                .filter(|m| regex.is_match(&m.name))
                .map(|m| (m.name, m.id))
                .collect(),

            MetricSelector::Names { names, resource_query: Some(query) } => self
                .resource_metrics(config, query)
                .await?
                .into_iter()
                .filter(|(name, _)| names.contains(name))
                .collect(),

            MetricSelector::Pattern { regex, resource_query: Some(query) } => self
                .resource_metrics(config, query)
                .await?
                .into_iter()
                .filter(|(name, _)| regex.is_match(name))
                .collect(),

            MetricSelector::Resources(query) => self.resource_metrics(config, query).await?,

            MetricSelector::All => self
                .api
                .all_metrics(endpoint)
                .await?
                .into_iter()
                .map(|m| (m.name, m.id))
                .collect(),
        };
        debug!(series = resolved.len(), "metrics resolved");
        Ok(resolved)
    }

    async fn resource_metrics(
        &self,
        config: &MetricsStoreConfig,
        query: &serde_json::Value,
    ) -> Result<BTreeMap<String, String>, AdapterError> {
        Ok(self
            .api
            .search_resources(&config.endpoint, query)
            .await?
            .into_iter()
            .flat_map(|r| r.metrics)
            .collect())
    }

    /// Queries for the resolved series: only aggregates when any are configured.
    pub fn build_queries(config: &MetricsStoreConfig, resolved: &BTreeMap<String, String>) -> Vec<SeriesQuery> {
        if !config.aggregations.is_empty() {
            return config
                .aggregations
                .iter()
                .map(|spec| SeriesQuery::Aggregate {
                    name: spec.name.clone(),
                    function: spec.function.clone(),
                    ids: spec.member_ids(resolved),
                })
                .collect();
        }
        resolved
            .iter()
            .map(|(name, id)| SeriesQuery::Metric {
                name: name.clone(),
                id: id.clone(),
            })
            .collect()
    }
}

#[async_trait]
impl EndpointAdapter for MetricsStoreAdapter {
    type Config = MetricsStoreConfig;
    type QuerySet = Vec<SeriesQuery>;
    type RawItem = SeriesMeasure;
    type Error = AdapterError;

    fn name(&self) -> &str {
        CONNECTOR
    }

    fn marker_tag(&self) -> &str {
        MARKER_TAG
    }

    fn configure(&self, trigger: &TriggerSnapshot, defaults: &Properties) -> Result<MetricsStoreConfig, AdapterError> {
        MetricsStoreConfig::from_trigger(trigger, defaults)
    }

    async fn resolve_selectors(&self, config: &MetricsStoreConfig) -> Result<Vec<SeriesQuery>, AdapterError> {
        let resolved = self.resolve_names(config).await?;
        Ok(Self::build_queries(config, &resolved))
    }

    async fn fetch(
        &self,
        config: &MetricsStoreConfig,
        queries: &Vec<SeriesQuery>,
        window: &FetchWindow,
    ) -> Result<Vec<SeriesMeasure>, AdapterError> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let requests = queries.iter().map(|query| {
            let semaphore = semaphore.clone();
            async move {
                let _permit = semaphore.acquire_owned().await;
                let result = self
                    .api
                    .measures(&config.endpoint, query, &config.granularity, window.start)
                    .await;
                (query.name(), result)
            }
        });

        let mut measures = Vec::new();
        let mut first_error = None;
        let mut failed = 0;
        for (series, result) in join_all(requests).await {
            match result {
                Ok(batch) => measures.extend(batch.into_iter().map(|measure| SeriesMeasure {
                    series: series.to_string(),
                    measure,
                })),
                Err(e) => {
                    warn!(series, error = %e, "measures request failed");
                    failed += 1;
                    first_error.get_or_insert(e);
                }
            }
        }

        // Partial results are still delivered; only a total failure fails the tick.
        match first_error {
            Some(e) if failed == queries.len() => Err(e),
            _ => Ok(measures),
        }
    }

    fn map(&self, _config: &MetricsStoreConfig, item: SeriesMeasure) -> Option<CanonicalRecord> {
        let timestamp = match DateTime::parse_from_rfc3339(&item.measure.timestamp) {
            Ok(ts) => ts.with_timezone(&Utc),
            Err(e) => {
                debug!(series = %item.series, timestamp = %item.measure.timestamp, error = %e, "unparseable measure timestamp");
                return None;
            }
        };
        Some(
            CanonicalRecord::metric(&item.series, timestamp, item.measure.value)
                .with_context("granularity", item.measure.granularity.to_string()),
        )
    }
}
