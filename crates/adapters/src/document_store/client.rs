use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::Value;
use tracing::debug;

use crate::error::AdapterError;
use crate::http::{build_client, Endpoint};

/// One page of search hits.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchPage {
    /// Total matching documents, across all pages.
    pub total: u64,
    pub hits: Vec<Value>,
}

impl SearchPage {
    /// Decode a `_search` response. `hits.total` may be a plain number or
    /// `{ "value": n }`.
    pub fn from_response(body: &Value) -> Self {
        let hits = &body["hits"];
        let total = match &hits["total"] {
            Value::Number(n) => n.as_u64().unwrap_or(0),
            Value::Object(o) => o.get("value").and_then(Value::as_u64).unwrap_or(0),
            _ => 0,
        };
        Self {
            total,
            hits: hits["hits"].as_array().cloned().unwrap_or_default(),
        }
    }
}

/// Search endpoint of a document store.
#[async_trait]
pub trait SearchTransport: Send + Sync {
    /// Run `body` against `indices` (all indices when empty). A missing index
    /// is reported as [`AdapterError::IndexNotFound`].
    async fn search(
        &self,
        endpoint: &Endpoint,
        indices: &[String],
        body: &Value,
        preference: &str,
    ) -> Result<SearchPage, AdapterError>;
}

pub fn search_path(indices: &[String]) -> String {
    if indices.is_empty() {
        "/_search".to_string()
    } else {
        format!("/{}/_search", indices.join(","))
    }
}

/// Classify an error response: `index_not_found_exception` names the
/// missing index, anything else stays a status error.
pub fn search_error(status: u16, body: String) -> AdapterError {
    let index = serde_json::from_str::<Value>(&body).ok().and_then(|v| {
        let error = v.get("error")?;
        if error.get("type").and_then(Value::as_str) != Some("index_not_found_exception") {
            return None;
        }
        error
            .get("resource.id")
            .or_else(|| error.get("index"))
            .and_then(Value::as_str)
            .map(str::to_string)
    });
    match index {
        Some(index) => AdapterError::IndexNotFound { index },
        None => AdapterError::Status { status, body },
    }
}

/// [`SearchTransport`] over the `_search` REST API.
#[derive(Debug, Clone)]
pub struct HttpSearch {
    client: Client,
}

impl HttpSearch {
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
impl SearchTransport for HttpSearch {
    async fn search(
        &self,
        endpoint: &Endpoint,
        indices: &[String],
        body: &Value,
        preference: &str,
    ) -> Result<SearchPage, AdapterError> {
        let path = search_path(indices);
        debug!(path = %path, "document search");
        let response = endpoint
            .request(&self.client, Method::POST, &path)
            .query(&[("preference", preference)])
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(search_error(status.as_u16(), text));
        }
        let bytes = response.bytes().await?;
        let value: Value = serde_json::from_slice(&bytes)?;
        Ok(SearchPage::from_response(&value))
    }
}
