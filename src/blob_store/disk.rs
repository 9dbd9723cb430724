/// Disk-based blob storage backend
use crate::{
    blob_store::BlobBackend,
    error::{PostError, PostResult},
};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;

/// Disk storage backend
///
/// Stores blobs on the local filesystem with directory sharding
/// based on key prefixes to prevent too many files in one directory.
#[derive(Clone)]
pub struct DiskBlobBackend {
    base_path: PathBuf,
}

impl DiskBlobBackend {
    /// Create a new disk storage backend
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    /// Get the file path for a key
    ///
    /// Uses directory sharding: {base}/{first2chars}/{key}
    /// For example, key "9f3c...-cat.png" -> {base}/9f/9f3c...-cat.png
    fn get_blob_path(&self, key: &str) -> PostResult<PathBuf> {
        if key.is_empty()
            || key.contains('/')
            || key.contains('\\')
            || key.contains("..")
            || key.starts_with('.')
        {
            return Err(PostError::Storage(format!("Invalid blob key: {:?}", key)));
        }

        let shard: String = key.chars().take(2).collect();
        if shard.chars().count() == 2 {
            Ok(self.base_path.join(shard).join(key))
        } else {
            Ok(self.base_path.join("_").join(key))
        }
    }

    /// Ensure the directory for a blob exists
    async fn ensure_blob_dir(&self, key: &str) -> PostResult<PathBuf> {
        let blob_path = self.get_blob_path(key)?;
        if let Some(parent) = blob_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                PostError::Storage(format!("Failed to create blob directory: {}", e))
            })?;
        }
        Ok(blob_path)
    }
}

#[async_trait]
impl BlobBackend for DiskBlobBackend {
    async fn put(&self, key: &str, data: Vec<u8>, _mime_type: &str) -> PostResult<()> {
        let blob_path = self.ensure_blob_dir(key).await?;

        fs::write(&blob_path, data)
            .await
            .map_err(|e| PostError::Storage(format!("Failed to write blob {}: {}", key, e)))?;

        Ok(())
    }

    async fn get(&self, key: &str) -> PostResult<Option<Vec<u8>>> {
        let blob_path = self.get_blob_path(key)?;

        match fs::read(&blob_path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PostError::Storage(format!(
                "Failed to read blob {}: {}",
                key, e
            ))),
        }
    }

    async fn delete(&self, key: &str) -> PostResult<()> {
        let blob_path = self.get_blob_path(key)?;

        match fs::remove_file(&blob_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PostError::Storage(format!(
                "Failed to delete blob {}: {}",
                key, e
            ))),
        }
    }
}
