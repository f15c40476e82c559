use alerter_core::CollaboratorError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("record sink unavailable: {0}")]
    SinkUnavailable(#[source] CollaboratorError),

    #[error("could not register change listener: {0}")]
    FeedRegistration(#[source] CollaboratorError),

    #[error("initial trigger load failed: {0}")]
    Bootstrap(#[source] CollaboratorError),

    #[error("connector {0} is already running")]
    AlreadyRunning(String),
}
