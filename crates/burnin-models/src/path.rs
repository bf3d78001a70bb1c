//! Storage-relative object paths.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced when validating a storage path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("storage path is empty")]
    Empty,

    #[error("storage path must be relative: {0}")]
    Absolute(String),

    #[error("storage path has no file name: {0}")]
    MissingFileName(String),
}

/// Path of an object inside the bucket, e.g. `staging/abc.mp4`.
///
/// Always relative: a leading separator is rejected at construction time,
/// including when the path arrives through a deserialized job message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StoragePath(String);

impl StoragePath {
    /// Validate and wrap a path.
    pub fn parse(path: impl Into<String>) -> Result<Self, PathError> {
        let path = path.into();

        if path.is_empty() {
            return Err(PathError::Empty);
        }
        if path.starts_with('/') || path.starts_with('\\') {
            return Err(PathError::Absolute(path));
        }

        let name = path.rsplit('/').next().unwrap_or_default();
        if name.is_empty() || name == "." || name == ".." {
            return Err(PathError::MissingFileName(path));
        }

        Ok(Self(path))
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last `/`-separated component.
    pub fn file_name(&self) -> &str {
        // parse() guarantees a non-empty final component
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Place this path's file name under `prefix`.
    ///
    /// `staging/abc.mp4` under `video` becomes `video/abc.mp4`. Slashes around
    /// the prefix are ignored and an empty prefix yields the bare file name.
    pub fn file_name_under(&self, prefix: &str) -> StoragePath {
        let prefix = prefix.trim_matches('/');
        if prefix.is_empty() {
            Self(self.file_name().to_string())
        } else {
            Self(format!("{}/{}", prefix, self.file_name()))
        }
    }
}

impl TryFrom<String> for StoragePath {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<StoragePath> for String {
    fn from(path: StoragePath) -> Self {
        path.0
    }
}

impl AsRef<str> for StoragePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoragePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
