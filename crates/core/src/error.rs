use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Property file parse error: {0}")]
    PropertyParse(#[from] toml::de::Error),

    #[error("Invalid property {key}: {reason}")]
    InvalidProperty { key: String, reason: String },
}

/// Failure reported by one of the platform collaborators a connector talks to.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollaboratorError {
    #[error("definitions lookup failed: {0}")]
    Lookup(String),

    #[error("sink rejected records: {0}")]
    Sink(String),

    #[error("change feed error: {0}")]
    Feed(String),

    #[error("{0} unavailable")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
