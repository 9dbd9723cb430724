/// Blob Storage System
///
/// Handles binary storage for post images and maps stored objects to
/// stable public URLs. Supports multiple backend implementations.

pub mod disk;
pub mod models;
pub mod store;
#[cfg(test)]
pub mod testing;

pub use models::*;
pub use store::BlobStore;

use crate::error::PostResult;
use async_trait::async_trait;

/// Blob storage backend trait
///
/// Implementations handle the actual storage and retrieval of blob data,
/// addressed by storage key.
#[async_trait]
pub trait BlobBackend: Send + Sync {
    /// Store a blob under `key`
    async fn put(&self, key: &str, data: Vec<u8>, mime_type: &str) -> PostResult<()>;

    /// Retrieve a blob by key
    async fn get(&self, key: &str) -> PostResult<Option<Vec<u8>>>;

    /// Delete a blob by key
    async fn delete(&self, key: &str) -> PostResult<()>;
}
