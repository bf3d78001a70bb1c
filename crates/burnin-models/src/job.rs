//! Transcode job message.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::StoragePath;

/// Errors raised while decoding a job message body.
#[derive(Debug, Error)]
pub enum JobDecodeError {
    #[error("invalid job payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid job: {0}")]
    Invalid(String),
}

/// Job published by the ingest side after staging a video.
///
/// Wire format:
/// `{"video": "<path>", "overlay": "<path>"?, "content_type": "<mime>"}`.
/// An absent overlay means the video is stored unmodified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TranscodeJob {
    /// Staged source video
    #[schemars(with = "String")]
    pub video: StoragePath,
    /// Staged overlay image, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<String>")]
    pub overlay: Option<StoragePath>,
    /// Content type of the video, reused for the final upload
    pub content_type: String,
}

impl TranscodeJob {
    /// Create a job without overlay.
    pub fn new(video: StoragePath, content_type: impl Into<String>) -> Self {
        Self {
            video,
            overlay: None,
            content_type: content_type.into(),
        }
    }

    /// Set the overlay image.
    pub fn with_overlay(mut self, overlay: StoragePath) -> Self {
        self.overlay = Some(overlay);
        self
    }

    /// Decode and validate a message body.
    pub fn decode(payload: &[u8]) -> Result<Self, JobDecodeError> {
        let job: TranscodeJob = serde_json::from_slice(payload)?;
        job.validate()?;
        Ok(job)
    }

    /// Serialize to the wire format.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    fn validate(&self) -> Result<(), JobDecodeError> {
        if self.content_type.trim().is_empty() {
            return Err(JobDecodeError::Invalid("content_type is empty".to_string()));
        }
        Ok(())
    }

    /// Final location of the result: the video's file name under `prefix`.
    ///
    /// Deterministic, so a redelivered job overwrites the same object.
    pub fn output_path(&self, prefix: &str) -> StoragePath {
        self.video.file_name_under(prefix)
    }

    /// Whether an overlay has to be burned in.
    pub fn has_overlay(&self) -> bool {
        self.overlay.is_some()
    }
}
