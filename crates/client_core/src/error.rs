use shared::domain::Resource;
use thiserror::Error;

/// Failure of a single call to the todo server.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("request rejected: {0}")]
    Rejected(String),
    #[error("server unavailable: {0}")]
    Unavailable(String),
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl TransportError {
    /// Only failures that a later attempt could plausibly fix are retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransportError::Unavailable(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("failed to load todos: {0}")]
    LoadFailure(String),
    #[error("server sent invalid todo data: {0}")]
    InvalidShape(String),
    #[error("update of {resource} failed: {source}")]
    MutationFailure {
        resource: Resource,
        source: TransportError,
    },
    #[error("{resource} does not exist on the server")]
    NotFound { resource: Resource },
    #[error("order must list every loaded todo exactly once")]
    InvalidOrder,
    #[error("mutation task for {resource} ended before completing")]
    Abandoned { resource: Resource },
}

impl ClientError {
    pub(crate) fn from_mutation(resource: Resource, err: TransportError) -> Self {
        match err {
            TransportError::NotFound(_) => ClientError::NotFound { resource },
            other => ClientError::MutationFailure {
                resource,
                source: other,
            },
        }
    }
}
