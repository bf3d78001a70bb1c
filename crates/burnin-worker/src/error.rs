//! Worker error types.

use burnin_media::MediaError;
use burnin_models::JobDecodeError;
use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Malformed job: {0}")]
    MalformedJob(#[from] JobDecodeError),

    #[error("Storage error: {0}")]
    Storage(#[from] burnin_storage::StorageError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Queue error: {0}")]
    Queue(#[from] burnin_queue::QueueError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Failure class used for logs and metrics labels.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkerError::ConfigError(_) => "configuration",
            WorkerError::MalformedJob(_) => "malformed_job",
            WorkerError::Storage(e) if !e.is_transient() => "configuration",
            WorkerError::Storage(_) | WorkerError::Queue(_) | WorkerError::Io(_) => "transient_io",
            WorkerError::Media(MediaError::ProbeParse { .. }) => "probe_parse",
            WorkerError::Media(MediaError::CompositorFailed { .. }) => "compositor_process",
            WorkerError::Media(MediaError::Io(_)) => "transient_io",
            WorkerError::Media(_) | WorkerError::Internal(_) => "internal",
        }
    }

    /// Whether retrying the same payload can never succeed.
    pub fn is_malformed(&self) -> bool {
        matches!(self, WorkerError::MalformedJob(_))
    }
}
