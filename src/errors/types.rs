use thiserror::Error;

/// Errors returned by every `OutboxRepository` operation.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("message with id {id} already exists")]
    DuplicateId { id: String },

    #[error("message with id {id} not found")]
    NotFound { id: String },

    #[error("payload serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Returned by a `Publisher::publish` implementation. The core dispatcher
/// must not know broker-specific error shapes, so adapters report through
/// `anyhow::Error`.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct PublishError(#[from] pub anyhow::Error);

impl PublishError {
    pub fn new(err: impl Into<anyhow::Error>) -> Self {
        Self(err.into())
    }
}

/// Errors surfaced from a single dispatcher tick.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to claim a batch of messages: {0}")]
    Claim(#[from] RepositoryError),

    #[error("invalid dispatcher configuration: {0}")]
    InvalidConfig(String),
}

/// Errors surfaced while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] figment::Error),
}
