//! Fetched artifacts.

use crate::StoragePath;

/// Raw content of a stored object together with where it came from.
///
/// Owned by the job execution that fetched it and dropped when the job ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: StoragePath,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl Artifact {
    pub fn new(path: StoragePath, content_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            path,
            content_type: content_type.into(),
            data,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}
