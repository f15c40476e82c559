use alerter_core::{Properties, TriggerSnapshot};
use regex::Regex;
use serde_json::Value;

use super::aggregation::AggregationSpec;
use super::CONNECTOR;
use crate::error::AdapterError;
use crate::http::{Auth, Endpoint};
use crate::settings::context_or_default;

pub const METRIC_IDS: &str = "metric.ids";
pub const METRIC_NAMES: &str = "metric.names";
pub const METRIC_NAMES_REGEXP: &str = "metric.names.regexp";
pub const METRIC_RESOURCE_QUERY: &str = "metric.resource.query";
pub const METRIC_AGGREGATION: &str = "metric.aggregation";
pub const METRIC_GRANULARITY: &str = "metric.granularity";

pub const DEFAULT_URL: &str = "http://localhost:8041";
pub const DEFAULT_USER: &str = "admin";
pub const DEFAULT_PASSWORD: &str = "admin";
pub const DEFAULT_GRANULARITY: &str = "300";

/// Which series a trigger watches, in priority order.
#[derive(Debug, Clone)]
pub enum MetricSelector {
    /// Fixed ids; each id doubles as the series name.
    Ids(Vec<String>),
    /// Names, looked up one by one or picked out of the resource search.
    Names {
        names: Vec<String>,
        resource_query: Option<Value>,
    },
    /// Names fully matching a pattern, among all series or the resource search.
    Pattern {
        regex: Regex,
        resource_query: Option<Value>,
    },
    /// Every series attached to the resources matched by the query.
    Resources(Value),
    All,
}

impl MetricSelector {
    pub fn from_trigger(trigger: &TriggerSnapshot) -> Result<Self, AdapterError> {
        if let Some(ids) = trigger.context_value(METRIC_IDS) {
            return Ok(Self::Ids(split_list(ids)));
        }

        let resource_query = trigger
            .context_value(METRIC_RESOURCE_QUERY)
            .map(|raw| {
                serde_json::from_str::<Value>(raw)
                    .map_err(|e| AdapterError::config(format!("{METRIC_RESOURCE_QUERY}: {e}")))
            })
            .transpose()?;

        if let Some(names) = trigger.context_value(METRIC_NAMES) {
            return Ok(Self::Names {
                names: split_list(names),
                resource_query,
            });
        }
        if let Some(pattern) = trigger.context_value(METRIC_NAMES_REGEXP) {
            return Ok(Self::Pattern {
                regex: full_match(pattern)?,
                resource_query,
            });
        }
        Ok(match resource_query {
            Some(query) => Self::Resources(query),
            None => Self::All,
        })
    }
}

#[derive(Debug, Clone)]
pub struct MetricsStoreConfig {
    pub endpoint: Endpoint,
    pub selector: MetricSelector,
    pub aggregations: Vec<AggregationSpec>,
    pub granularity: String,
}

impl MetricsStoreConfig {
    pub fn from_trigger(trigger: &TriggerSnapshot, defaults: &Properties) -> Result<Self, AdapterError> {
        let url = context_or_default(trigger, "url", defaults, CONNECTOR, DEFAULT_URL);
        let user = context_or_default(trigger, "user", defaults, CONNECTOR, DEFAULT_USER);
        let password = context_or_default(trigger, "password", defaults, CONNECTOR, DEFAULT_PASSWORD);

        let aggregations = match trigger.context_value(METRIC_AGGREGATION) {
            Some(raw) => AggregationSpec::parse_all(raw)?,
            None => Vec::new(),
        };

        Ok(Self {
            endpoint: Endpoint::new(url).with_auth(Auth::Basic { user, password }),
            selector: MetricSelector::from_trigger(trigger)?,
            aggregations,
            granularity: trigger
                .context_value(METRIC_GRANULARITY)
                .unwrap_or(DEFAULT_GRANULARITY)
                .to_string(),
        })
    }
}

pub(crate) fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Compile `pattern` so it must match the whole name.
pub(crate) fn full_match(pattern: &str) -> Result<Regex, AdapterError> {
    Ok(Regex::new(&format!("^(?:{pattern})$"))?)
}
