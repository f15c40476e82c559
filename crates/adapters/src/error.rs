use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid regular expression: {0}")]
    Regex(#[from] regex::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("index not found: {index}")]
    IndexNotFound { index: String },
}

impl AdapterError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
