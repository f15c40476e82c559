//! Document-store adapter (Elasticsearch/OpenSearch `_search`).
//!
//! Each tick searches the trigger's indices for documents whose timestamp
//! falls inside the tick window, pages through every hit, and maps each hit
//! to a structured event through the trigger's field mapping.

pub mod client;
pub mod mapping;
pub mod query;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use alerter_core::{CanonicalRecord, EventPayload, Properties, TriggerSnapshot};
use alerter_scheduler::{EndpointAdapter, FetchWindow};

pub use client::{HttpSearch, SearchPage, SearchTransport};
pub use mapping::{EventField, Mapping};

use crate::error::AdapterError;
use crate::http::{Auth, Endpoint};
use crate::settings::context_or_default;
use query::{format_timestamp, parse_timestamp, search_body, PAGE_SIZE};

pub const CONNECTOR: &str = "elasticsearch";
pub const MARKER_TAG: &str = "Elasticsearch";
pub const DEFAULT_URL: &str = "http://localhost:9200";

pub const CONTEXT_TIMESTAMP: &str = "timestamp";
pub const CONTEXT_MAPPING: &str = "mapping";
pub const CONTEXT_URL: &str = "url";
pub const CONTEXT_INDEX: &str = "index";
pub const CONTEXT_FILTER: &str = "filter";
pub const CONTEXT_TIMESTAMP_PATTERN: &str = "timestamp_pattern";
pub const CONTEXT_USER: &str = "user";
pub const CONTEXT_PASS: &str = "pass";
pub const CONTEXT_TOKEN: &str = "token";
pub const CONTEXT_FORWARDED_FOR: &str = "forwarded-for";
pub const CONTEXT_PROXY_REMOTE_USER: &str = "proxy-remote-user";

/// Context key receiving the raw hit.
pub const SOURCE_CONTEXT: &str = "source";

#[derive(Debug, Clone)]
pub struct DocumentStoreConfig {
    pub endpoint: Endpoint,
    /// Empty searches every index.
    pub indices: Vec<String>,
    pub timestamp_field: String,
    pub timestamp_pattern: Option<String>,
    pub filter: Option<Value>,
    pub mapping: Mapping,
}

impl DocumentStoreConfig {
    pub fn from_trigger(trigger: &TriggerSnapshot, defaults: &Properties) -> Result<Self, AdapterError> {
        let timestamp_field = trigger
            .context_value(CONTEXT_TIMESTAMP)
            .ok_or_else(|| AdapterError::config(format!("context key [{CONTEXT_TIMESTAMP}] is required")))?
            .to_string();
        let mapping = trigger
            .context_value(CONTEXT_MAPPING)
            .ok_or_else(|| AdapterError::config(format!("context key [{CONTEXT_MAPPING}] is required")))
            .and_then(Mapping::parse)?;
        let filter = trigger
            .context_value(CONTEXT_FILTER)
            .map(|raw| {
                serde_json::from_str::<Value>(raw)
                    .map_err(|e| AdapterError::config(format!("{CONTEXT_FILTER}: {e}")))
            })
            .transpose()?;
        let indices = trigger
            .context_value(CONTEXT_INDEX)
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let setting = |key: &str, default: &str| context_or_default(trigger, key, defaults, CONNECTOR, default);
        let endpoint = Endpoint::new(setting(CONTEXT_URL, DEFAULT_URL))
            .with_auth(auth(trigger, setting(CONTEXT_USER, ""), setting(CONTEXT_PASS, ""), setting(CONTEXT_TOKEN, "")))
            .with_header("X-Forwarded-For", setting(CONTEXT_FORWARDED_FOR, ""))
            .with_header("X-Proxy-Remote-User", setting(CONTEXT_PROXY_REMOTE_USER, ""));

        Ok(Self {
            endpoint,
            indices,
            timestamp_field,
            timestamp_pattern: trigger.context_value(CONTEXT_TIMESTAMP_PATTERN).map(str::to_string),
            filter,
            mapping,
        })
    }
}

/// A token wins over user/password.
fn auth(trigger: &TriggerSnapshot, user: String, password: String, token: String) -> Auth {
    if !token.trim().is_empty() {
        return Auth::Bearer(token);
    }
    if user.trim().is_empty() {
        return Auth::None;
    }
    if password.is_empty() {
        warn!(trigger = %trigger.key(), user = %user, "user set without a password, sending no credentials");
        return Auth::None;
    }
    Auth::Basic { user, password }
}

pub struct DocumentStoreAdapter {
    transport: Arc<dyn SearchTransport>,
}

impl DocumentStoreAdapter {
    pub fn new(transport: Arc<dyn SearchTransport>) -> Self {
        Self { transport }
    }

    pub fn http() -> Result<Self, AdapterError> {
        Ok(Self::new(Arc::new(HttpSearch::new()?)))
    }

    /// Search, dropping indices the store reports as missing. `None` once no
    /// index is left.
    async fn search_existing(
        &self,
        endpoint: &Endpoint,
        indices: &mut Vec<String>,
        body: &Value,
        preference: &str,
    ) -> Result<Option<SearchPage>, AdapterError> {
        loop {
            match self.transport.search(endpoint, indices, body, preference).await {
                Err(AdapterError::IndexNotFound { index }) => {
                    let before = indices.len();
                    indices.retain(|i| *i != index);
                    if indices.len() == before {
                        return Err(AdapterError::IndexNotFound { index });
                    }
                    warn!(index = %index, remaining = indices.len(), "index not found, retrying without it");
                    if indices.is_empty() {
                        return Ok(None);
                    }
                }
                other => return other.map(Some),
            }
        }
    }
}

#[async_trait]
impl EndpointAdapter for DocumentStoreAdapter {
    type Config = DocumentStoreConfig;
    type QuerySet = Vec<String>;
    type RawItem = Value;
    type Error = AdapterError;

    fn name(&self) -> &str {
        CONNECTOR
    }

    fn marker_tag(&self) -> &str {
        MARKER_TAG
    }

    fn configure(&self, trigger: &TriggerSnapshot, defaults: &Properties) -> Result<DocumentStoreConfig, AdapterError> {
        DocumentStoreConfig::from_trigger(trigger, defaults)
    }

    async fn resolve_selectors(&self, config: &DocumentStoreConfig) -> Result<Vec<String>, AdapterError> {
        Ok(config.indices.clone())
    }

    async fn fetch(
        &self,
        config: &DocumentStoreConfig,
        indices: &Vec<String>,
        window: &FetchWindow,
    ) -> Result<Vec<Value>, AdapterError> {
        let pattern = config.timestamp_pattern.as_deref();
        let start = format_timestamp(window.start, pattern);
        let end = format_timestamp(window.end, pattern);
        // Shared by every page of this tick.
        let preference = Uuid::new_v4().to_string();
        let mut indices = indices.clone();

        let mut hits: Vec<Value> = Vec::new();
        let mut total: Option<u64> = None;
        loop {
            let fetched = hits.len() as u64;
            let size = total.map_or(PAGE_SIZE, |t| PAGE_SIZE.min(t.saturating_sub(fetched)));
            let body = search_body(
                fetched,
                size,
                &config.timestamp_field,
                &start,
                &end,
                config.filter.as_ref(),
            );
            let Some(page) = self
                .search_existing(&config.endpoint, &mut indices, &body, &preference)
                .await?
            else {
                break;
            };
            total = Some(page.total);
            if page.hits.is_empty() {
                break;
            }
            hits.extend(page.hits);
            if hits.len() as u64 >= page.total {
                break;
            }
        }
        debug!(hits = hits.len(), total = total.unwrap_or(0), "documents fetched");
        Ok(hits)
    }

    fn map(&self, config: &DocumentStoreConfig, hit: Value) -> Option<CanonicalRecord> {
        let mapped = config.mapping.apply(&hit);
        let timestamp = mapped
            .ctime
            .as_deref()
            .and_then(|raw| parse_timestamp(raw, config.timestamp_pattern.as_deref()))
            .unwrap_or_else(Utc::now);
        let id = mapped
            .id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let event = EventPayload {
            id,
            data_source: mapped.data_source,
            category: mapped.category,
            text: mapped.text,
            tags: mapped.tags,
        };
        let mut record = CanonicalRecord::event(mapped.data_id, timestamp, event);
        record.context = mapped.context;
        record.context.insert(SOURCE_CONTEXT.to_string(), hit.to_string());
        Some(record)
    }
}
