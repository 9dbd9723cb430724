/// Post use cases: create, update, delete and read
use crate::{
    auth::Session,
    blob_store::BlobStore,
    error::{PostError, PostResult},
    metrics,
    posts::{reconcile::reconcile, NewPost, Post, PostRepository, PostUpdate},
    validation::{PostValidator, RawSubmission},
};
use std::sync::Arc;

/// Orchestrates validation, blob reconciliation and persistence.
///
/// Blob mutations always complete before the persistence write, so a stored
/// post never references a blob that does not exist yet.
#[derive(Clone)]
pub struct PostService {
    repository: Arc<dyn PostRepository>,
    blobs: BlobStore,
    validator: PostValidator,
}

impl PostService {
    pub fn new(
        repository: Arc<dyn PostRepository>,
        blobs: BlobStore,
        validator: PostValidator,
    ) -> Self {
        Self {
            repository,
            blobs,
            validator,
        }
    }

    /// Create a post, or a reply when `parent_id` is set. Returns the new id.
    pub async fn create(
        &self,
        session: &Session,
        submission: RawSubmission,
        parent_id: Option<String>,
    ) -> PostResult<String> {
        let result = self.create_post(session, submission, parent_id).await;
        metrics::record_post_operation("create", result.is_ok());
        result
    }

    /// Replace an owned post's text, images and visibility. Returns the post id.
    pub async fn update(
        &self,
        session: &Session,
        id: &str,
        submission: RawSubmission,
    ) -> PostResult<String> {
        let result = self.update_post(session, id, submission).await;
        metrics::record_post_operation("update", result.is_ok());
        result
    }

    /// Delete an owned post together with all of its images. Returns the post id.
    pub async fn delete(&self, session: &Session, id: &str) -> PostResult<String> {
        let result = self.delete_post(session, id).await;
        metrics::record_post_operation("delete", result.is_ok());
        result
    }

    /// Read a post the caller is allowed to see.
    ///
    /// Posts hidden from the caller are reported as missing.
    pub async fn get(&self, session: &Session, id: &str) -> PostResult<Post> {
        match self.repository.get(id).await? {
            Some(post) if post.is_visible_to(session.user_id()) => Ok(post),
            _ => Err(PostError::NotFound(format!("Post {} not found", id))),
        }
    }

    async fn create_post(
        &self,
        session: &Session,
        submission: RawSubmission,
        parent_id: Option<String>,
    ) -> PostResult<String> {
        let owner_id = session.current_user_id()?;
        let payload = self.validator.validate(submission)?;
        let (text, kept, uploads, visibility) = payload.split_images();
        let upload_count = uploads.len();

        // A new post may only carry over images its author uploaded
        self.blobs.ensure_owned(&kept, owner_id).await?;

        let images = reconcile(&self.blobs, owner_id, kept, uploads, &[]).await?;

        let id = self
            .repository
            .create(NewPost {
                owner_id: owner_id.to_string(),
                text,
                images,
                visibility,
                parent_id: parent_id.clone(),
            })
            .await?;

        tracing::info!(
            post_id = %id,
            owner_id = %owner_id,
            parent_id = ?parent_id,
            uploaded = upload_count,
            "Created post"
        );

        Ok(id)
    }

    async fn update_post(
        &self,
        session: &Session,
        id: &str,
        submission: RawSubmission,
    ) -> PostResult<String> {
        let owner_id = session.current_user_id()?;
        let payload = self.validator.validate(submission)?;
        let (text, kept, uploads, visibility) = payload.split_images();
        let upload_count = uploads.len();

        // Only succeeds while every kept URL is still stored on the post
        let previous = self.repository.get_images(id, owner_id, &kept).await?;

        let images = reconcile(&self.blobs, owner_id, kept.clone(), uploads, &previous).await?;

        self.repository
            .update(PostUpdate {
                id: id.to_string(),
                owner_id: owner_id.to_string(),
                text,
                images,
                visibility,
                kept_images: kept,
            })
            .await?;

        tracing::info!(
            post_id = %id,
            owner_id = %owner_id,
            previous = previous.len(),
            uploaded = upload_count,
            "Updated post"
        );

        Ok(id.to_string())
    }

    async fn delete_post(&self, session: &Session, id: &str) -> PostResult<String> {
        let owner_id = session.current_user_id()?;

        let images = self.repository.get_images(id, owner_id, &[]).await?;

        // Keeping nothing and adding nothing deletes every stored image
        reconcile(&self.blobs, owner_id, Vec::new(), Vec::new(), &images).await?;

        self.repository.delete(id, owner_id).await?;

        tracing::info!(
            post_id = %id,
            owner_id = %owner_id,
            images = images.len(),
            "Deleted post"
        );

        Ok(id.to_string())
    }
}
