//! Object store abstraction.

use async_trait::async_trait;
use burnin_models::StoragePath;

use crate::error::StorageResult;

/// Blob storage addressed by relative paths.
///
/// Constructed once at startup and handed to the worker, so tests can swap in
/// an in-memory implementation.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Read the full content of an object.
    async fn read(&self, path: &StoragePath) -> StorageResult<Vec<u8>>;

    /// Write an object, replacing any existing content, and return its public URL.
    async fn write(
        &self,
        path: &StoragePath,
        data: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<String>;
}
