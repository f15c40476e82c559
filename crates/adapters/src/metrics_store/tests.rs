use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use chrono::{TimeZone, Utc};
use serde_json::{json, Value};

use alerter_core::IntervalSpec;
use alerter_scheduler::INTERVAL_KEY;

use super::client::Resource;
use super::config::*;
use super::*;
use crate::http::Endpoint;

/// In-memory metrics store: a catalogue of series, one resource, and a
/// canned list of measures per series id.
#[derive(Default)]
struct FakeMetrics {
    catalogue: Vec<MetricRef>,
    resource_metrics: HashMap<String, String>,
    measures: HashMap<String, Vec<Measure>>,
    failing_ids: HashSet<String>,
    catalogue_calls: AtomicUsize,
    named_calls: AtomicUsize,
    search_bodies: Mutex<Vec<Value>>,
    issued: Mutex<Vec<SeriesQuery>>,
}

impl FakeMetrics {
    fn with_catalogue(names: &[(&str, &str)]) -> Self {
        Self {
            catalogue: names
                .iter()
                .map(|(name, id)| MetricRef {
                    id: id.to_string(),
                    name: name.to_string(),
                })
                .collect(),
            ..Default::default()
        }
    }

    fn issued(&self) -> Vec<SeriesQuery> {
        self.issued.lock().unwrap().clone()
    }
}

#[async_trait]
impl MetricsApi for FakeMetrics {
    async fn metrics_named(&self, _endpoint: &Endpoint, name: &str) -> Result<Vec<MetricRef>, AdapterError> {
        self.named_calls.fetch_add(1, Ordering::SeqCst);
        // Mimic a prefix search so the exact-name filter matters.
        Ok(self
            .catalogue
            .iter()
            .filter(|m| m.name.starts_with(name))
            .cloned()
            .collect())
    }

    async fn all_metrics(&self, _endpoint: &Endpoint) -> Result<Vec<MetricRef>, AdapterError> {
        self.catalogue_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.catalogue.clone())
    }

    async fn search_resources(&self, _endpoint: &Endpoint, query: &Value) -> Result<Vec<Resource>, AdapterError> {
        self.search_bodies.lock().unwrap().push(query.clone());
        Ok(vec![Resource {
            metrics: self.resource_metrics.clone(),
        }])
    }

    async fn measures(
        &self,
        _endpoint: &Endpoint,
        query: &SeriesQuery,
        _granularity: &str,
        _start: chrono::DateTime<Utc>,
    ) -> Result<Vec<Measure>, AdapterError> {
        self.issued.lock().unwrap().push(query.clone());
        let key = match query {
            SeriesQuery::Metric { id, .. } => id.clone(),
            SeriesQuery::Aggregate { name, .. } => name.clone(),
        };
        if self.failing_ids.contains(&key) {
            return Err(AdapterError::Status {
                status: 500,
                body: "boom".into(),
            });
        }
        Ok(self.measures.get(&key).cloned().unwrap_or_default())
    }
}

fn trigger() -> TriggerSnapshot {
    TriggerSnapshot::new("acme", "gnocchi-cpu").with_tag(MARKER_TAG, "")
}

fn measure(value: f64) -> Measure {
    Measure {
        timestamp: "2024-05-01T10:00:00+00:00".into(),
        granularity: 300.0,
        value,
    }
}

fn config_for(t: &TriggerSnapshot) -> MetricsStoreConfig {
    MetricsStoreConfig::from_trigger(t, &Properties::empty()).unwrap()
}

fn window() -> FetchWindow {
    FetchWindow::ending_now(IntervalSpec::default())
}

#[tokio::test]
async fn explicit_ids_give_exactly_those_series() {
    let fake = Arc::new(FakeMetrics::with_catalogue(&[("cpu", "x"), ("mem", "y")]));
    let adapter = MetricsStoreAdapter::new(fake.clone());
    let t = trigger()
        .with_context(METRIC_IDS, "a,b")
        .with_context(METRIC_NAMES, "cpu")
        .with_context(METRIC_NAMES_REGEXP, ".*");

    let queries = adapter.resolve_selectors(&config_for(&t)).await.unwrap();
    assert_eq!(
        queries,
        vec![
            SeriesQuery::Metric { name: "a".into(), id: "a".into() },
            SeriesQuery::Metric { name: "b".into(), id: "b".into() },
        ]
    );
    assert_eq!(fake.catalogue_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn names_are_looked_up_one_by_one() {
    let fake = Arc::new(FakeMetrics::with_catalogue(&[
        ("cpu", "id-cpu"),
        ("cpu.util", "id-util"),
        ("memory", "id-mem"),
    ]));
    let adapter = MetricsStoreAdapter::new(fake.clone());
    let t = trigger().with_context(METRIC_NAMES, "cpu, memory");

    let resolved = adapter.resolve_names(&config_for(&t)).await.unwrap();
    assert_eq!(resolved.len(), 2);
    assert_eq!(resolved["cpu"], "id-cpu");
    assert_eq!(resolved["memory"], "id-mem");
    assert_eq!(fake.named_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn pattern_filters_the_catalogue() {
    let fake = Arc::new(FakeMetrics::with_catalogue(&[
        ("disk.read", "r"),
        ("disk.write", "w"),
        ("netdisk.read", "n"),
    ]));
    let adapter = MetricsStoreAdapter::new(fake);
    let t = trigger().with_context(METRIC_NAMES_REGEXP, "disk\\..*");

    let resolved = adapter.resolve_names(&config_for(&t)).await.unwrap();
    assert_eq!(resolved.keys().cloned().collect::<Vec<_>>(), vec!["disk.read", "disk.write"]);
}

#[tokio::test]
async fn resource_query_narrows_names() {
    let mut fake = FakeMetrics::with_catalogue(&[("cpu", "catalogue-cpu")]);
    fake.resource_metrics = [("cpu", "res-cpu"), ("memory", "res-mem")]
        .into_iter()
        .map(|(n, i)| (n.to_string(), i.to_string()))
        .collect();
    let fake = Arc::new(fake);
    let adapter = MetricsStoreAdapter::new(fake.clone());
    let t = trigger()
        .with_context(METRIC_NAMES, "cpu")
        .with_context(METRIC_RESOURCE_QUERY, r#"{"=": {"host": "node-1"}}"#);

    let resolved = adapter.resolve_names(&config_for(&t)).await.unwrap();
    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved["cpu"], "res-cpu");
    assert_eq!(
        fake.search_bodies.lock().unwrap().as_slice(),
        &[json!({"=": {"host": "node-1"}})]
    );
    assert_eq!(fake.named_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn resource_query_alone_takes_every_attached_series() {
    let mut fake = FakeMetrics::default();
    fake.resource_metrics = [("cpu", "1"), ("memory", "2"), ("disk", "3")]
        .into_iter()
        .map(|(n, i)| (n.to_string(), i.to_string()))
        .collect();
    let adapter = MetricsStoreAdapter::new(Arc::new(fake));
    let t = trigger().with_context(METRIC_RESOURCE_QUERY, "{}");

    assert_eq!(adapter.resolve_names(&config_for(&t)).await.unwrap().len(), 3);
}

#[tokio::test]
async fn no_selector_takes_every_series() {
    let fake = Arc::new(FakeMetrics::with_catalogue(&[("a", "1"), ("b", "2"), ("c", "3")]));
    let adapter = MetricsStoreAdapter::new(fake);

    let queries = adapter.resolve_selectors(&config_for(&trigger())).await.unwrap();
    assert_eq!(queries.len(), 3);
}

#[tokio::test]
async fn aggregates_replace_plain_series() {
    let fake = Arc::new(FakeMetrics::with_catalogue(&[
        ("cpu.user", "u"),
        ("cpu.system", "s"),
        ("memory", "m"),
    ]));
    let adapter = MetricsStoreAdapter::new(fake);
    let t = trigger().with_context(METRIC_AGGREGATION, "cpu=mean(cpu\\..*);all=sum(cpu.user,memory)");

    let queries = adapter.resolve_selectors(&config_for(&t)).await.unwrap();
    assert_eq!(
        queries,
        vec![
            SeriesQuery::Aggregate {
                name: "cpu".into(),
                function: "mean".into(),
                ids: vec!["s".into(), "u".into()],
            },
            SeriesQuery::Aggregate {
                name: "all".into(),
                function: "sum".into(),
                ids: vec!["u".into(), "m".into()],
            },
        ]
    );
}

#[tokio::test]
async fn fetch_queries_every_series_and_maps_measures() {
    let mut fake = FakeMetrics::default();
    fake.measures.insert("a".into(), vec![measure(1.0), measure(2.0)]);
    fake.measures.insert("b".into(), vec![measure(3.0)]);
    let fake = Arc::new(fake);
    let adapter = MetricsStoreAdapter::new(fake.clone());
    let t = trigger().with_context(METRIC_IDS, "a,b");
    let config = config_for(&t);

    let queries = adapter.resolve_selectors(&config).await.unwrap();
    let items = adapter.fetch(&config, &queries, &window()).await.unwrap();
    assert_eq!(items.len(), 3);
    assert_eq!(fake.issued().len(), 2);

    let records: Vec<_> = items
        .into_iter()
        .filter_map(|item| adapter.map(&config, item))
        .collect();
    let b = records.iter().find(|r| r.data_id == "b").unwrap();
    assert_eq!(b.metric_value(), Some(3.0));
    assert_eq!(b.timestamp, Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap());
    assert_eq!(b.context.get("granularity").map(String::as_str), Some("300"));
}

#[tokio::test]
async fn one_failing_series_does_not_sink_the_others() {
    let mut fake = FakeMetrics::default();
    fake.measures.insert("a".into(), vec![measure(1.0)]);
    fake.failing_ids.insert("b".into());
    let adapter = MetricsStoreAdapter::new(Arc::new(fake));
    let config = config_for(&trigger().with_context(METRIC_IDS, "a,b"));

    let queries = adapter.resolve_selectors(&config).await.unwrap();
    let items = adapter.fetch(&config, &queries, &window()).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].series, "a");
}

#[tokio::test]
async fn all_series_failing_fails_the_fetch() {
    let mut fake = FakeMetrics::default();
    fake.failing_ids.insert("a".into());
    let adapter = MetricsStoreAdapter::new(Arc::new(fake));
    let config = config_for(&trigger().with_context(METRIC_IDS, "a"));

    let queries = adapter.resolve_selectors(&config).await.unwrap();
    assert!(adapter.fetch(&config, &queries, &window()).await.is_err());
}

#[test]
fn unparseable_timestamp_is_dropped() {
    let adapter = MetricsStoreAdapter::new(Arc::new(FakeMetrics::default()));
    let config = config_for(&trigger());
    let item = SeriesMeasure {
        series: "a".into(),
        measure: Measure {
            timestamp: "yesterday".into(),
            granularity: 60.0,
            value: 1.0,
        },
    };
    assert!(adapter.map(&config, item).is_none());
}

#[test]
fn interval_comes_from_context() {
    let adapter = MetricsStoreAdapter::new(Arc::new(FakeMetrics::default()));
    let t = trigger().with_context(INTERVAL_KEY, "45s");
    assert_eq!(adapter.interval(&t, IntervalSpec::default()), IntervalSpec::seconds(45));
}
