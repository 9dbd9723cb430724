/// Blob storage data models
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Blob metadata stored in database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobMetadata {
    pub key: String,
    pub url: String,
    /// User who uploaded the blob; only they may reference or delete it
    pub owner_id: String,
    pub mime_type: String,
    pub size: i64,
    pub file_name: String,
    pub created_at: DateTime<Utc>,
}

/// A new image file waiting to be uploaded
#[derive(Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub file_name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl std::fmt::Debug for ImageUpload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageUpload")
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("size", &self.data.len())
            .finish()
    }
}
