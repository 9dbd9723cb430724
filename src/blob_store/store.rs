/// Blob Store Manager
///
/// Coordinates blob storage backends with database metadata tracking and
/// public URL assignment
use crate::{
    blob_store::{disk::DiskBlobBackend, BlobBackend, BlobMetadata, ImageUpload},
    error::{PostError, PostResult},
    metrics,
};
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

/// Path segment under the public URL that blobs are served from
const BLOB_ROUTE: &str = "/blob/";

/// Longest file name kept in a storage key
const MAX_KEY_NAME_LEN: usize = 100;

/// Main blob store manager
#[derive(Clone)]
pub struct BlobStore {
    backend: Arc<dyn BlobBackend>,
    db: SqlitePool,
    public_url: String,
}

impl BlobStore {
    /// Create a new blob store over an arbitrary backend
    pub fn new(backend: Arc<dyn BlobBackend>, db: SqlitePool, public_url: &str) -> Self {
        Self {
            backend,
            db,
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }

    /// Create a blob store that keeps blobs on local disk
    pub fn disk(location: PathBuf, db: SqlitePool, public_url: &str) -> Self {
        Self::new(Arc::new(DiskBlobBackend::new(location)), db, public_url)
    }

    /// Public URL for a storage key
    pub fn url_for_key(&self, key: &str) -> String {
        format!("{}{}{}", self.public_url, BLOB_ROUTE, key)
    }

    /// Storage key behind a public URL, if the URL belongs to this store
    pub fn key_for_url<'a>(&self, url: &'a str) -> Option<&'a str> {
        let key = url
            .strip_prefix(self.public_url.as_str())?
            .strip_prefix(BLOB_ROUTE)?;

        if key.is_empty() || key.contains('/') {
            None
        } else {
            Some(key)
        }
    }

    /// Upload a file on behalf of `owner_id` and return its public URL.
    ///
    /// Every call produces a fresh key, so uploading the same file name twice
    /// yields two distinct blobs.
    pub async fn put(&self, upload: ImageUpload, owner_id: &str) -> PostResult<String> {
        let key = storage_key(&upload.file_name);
        let url = self.url_for_key(&key);
        let size = upload.data.len() as i64;

        let result = async {
            self.backend
                .put(&key, upload.data, &upload.mime_type)
                .await?;
            self.store_metadata(&key, &url, owner_id, &upload.mime_type, size, &upload.file_name)
                .await
        }
        .await;
        metrics::record_blob_operation("upload", result.is_ok());
        result?;

        tracing::debug!("Uploaded blob {} ({} bytes)", key, size);

        Ok(url)
    }

    /// Delete the blob behind a public URL if `owner_id` uploaded it.
    ///
    /// URLs that do not point into this store, or point at another user's
    /// blob, are skipped.
    pub async fn delete(&self, url: &str, owner_id: &str) -> PostResult<()> {
        let Some(key) = self.key_for_url(url) else {
            tracing::warn!("Skipping delete of blob URL not managed by this store: {}", url);
            return Ok(());
        };

        match self.get_metadata(key).await? {
            Some(metadata) if metadata.owner_id == owner_id => {}
            _ => {
                tracing::warn!(
                    blob_key = %key,
                    owner_id = %owner_id,
                    "Skipping delete of blob not owned by caller"
                );
                return Ok(());
            }
        }

        let result = async {
            self.backend.delete(key).await?;
            self.delete_metadata(key).await
        }
        .await;
        metrics::record_blob_operation("delete", result.is_ok());
        result?;

        tracing::debug!("Deleted blob {}", key);

        Ok(())
    }

    /// Fail with `NotFound` unless every URL into this store names a blob
    /// uploaded by `owner_id`. URLs outside the store are not checked.
    pub async fn ensure_owned(&self, urls: &[String], owner_id: &str) -> PostResult<()> {
        for url in urls {
            let Some(key) = self.key_for_url(url) else {
                continue;
            };

            match self.get_metadata(key).await? {
                Some(metadata) if metadata.owner_id == owner_id => {}
                _ => {
                    return Err(PostError::NotFound(format!(
                        "Blob {} not found for owner {}",
                        key, owner_id
                    )))
                }
            }
        }

        Ok(())
    }

    /// Get a blob and its MIME type by key
    pub async fn get(&self, key: &str) -> PostResult<Option<(Vec<u8>, String)>> {
        let Some(data) = self.backend.get(key).await? else {
            return Ok(None);
        };

        let mime_type = self
            .get_metadata(key)
            .await?
            .map(|m| m.mime_type)
            .unwrap_or_else(|| "application/octet-stream".to_string());

        Ok(Some((data, mime_type)))
    }

    /// Get blob metadata from database
    pub async fn get_metadata(&self, key: &str) -> PostResult<Option<BlobMetadata>> {
        let result = sqlx::query(
            r#"
            SELECT key, url, owner_id, mime_type, size, file_name, created_at
            FROM blob_metadata
            WHERE key = ?1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.db)
        .await?;

        if let Some(row) = result {
            Ok(Some(BlobMetadata {
                key: row.try_get("key")?,
                url: row.try_get("url")?,
                owner_id: row.try_get("owner_id")?,
                mime_type: row.try_get("mime_type")?,
                size: row.try_get("size")?,
                file_name: row.try_get("file_name")?,
                created_at: row.try_get("created_at")?,
            }))
        } else {
            Ok(None)
        }
    }

    /// Store blob metadata in database
    async fn store_metadata(
        &self,
        key: &str,
        url: &str,
        owner_id: &str,
        mime_type: &str,
        size: i64,
        file_name: &str,
    ) -> PostResult<()> {
        sqlx::query(
            r#"
            INSERT INTO blob_metadata (key, url, owner_id, mime_type, size, file_name, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(key)
        .bind(url)
        .bind(owner_id)
        .bind(mime_type)
        .bind(size)
        .bind(file_name)
        .bind(Utc::now())
        .execute(&self.db)
        .await
        .map_err(|e| PostError::Storage(format!("Failed to record blob {}: {}", key, e)))?;

        Ok(())
    }

    /// Delete blob metadata from database
    async fn delete_metadata(&self, key: &str) -> PostResult<()> {
        sqlx::query("DELETE FROM blob_metadata WHERE key = ?1")
            .bind(key)
            .execute(&self.db)
            .await
            .map_err(|e| PostError::Storage(format!("Failed to forget blob {}: {}", key, e)))?;

        Ok(())
    }
}

/// Build a fresh storage key from an uploaded file name
fn storage_key(file_name: &str) -> String {
    format!("{}-{}", Uuid::new_v4().simple(), sanitize_file_name(file_name))
}

/// Reduce a client-supplied file name to a safe key suffix
fn sanitize_file_name(file_name: &str) -> String {
    let base = file_name
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let cleaned = cleaned.trim_start_matches('.').replace("..", "_");
    let cleaned: String = cleaned.chars().take(MAX_KEY_NAME_LEN).collect();

    if cleaned.is_empty() {
        "image".to_string()
    } else {
        cleaned
    }
}
