/// Post persistence
use crate::{
    error::{PostError, PostResult},
    posts::{NewPost, Post, PostUpdate, Visibility},
};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

/// Storage of post records, scoped by post id and owner id
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Insert a new post and return its id
    async fn create(&self, post: NewPost) -> PostResult<String>;

    /// Replace the fields of an owned post.
    ///
    /// Fails with `NotFound` unless the post is owned by `update.owner_id`
    /// and its stored images still include every URL in `update.kept_images`.
    async fn update(&self, update: PostUpdate) -> PostResult<()>;

    /// Current images of an owned post that contains every URL in `must_contain`
    async fn get_images(
        &self,
        id: &str,
        owner_id: &str,
        must_contain: &[String],
    ) -> PostResult<Vec<String>>;

    /// Remove an owned post
    async fn delete(&self, id: &str, owner_id: &str) -> PostResult<()>;

    /// Look up a post by id regardless of owner
    async fn get(&self, id: &str) -> PostResult<Option<Post>>;
}

/// Matches rows whose `images` array contains every element of the JSON
/// array bound at `?{n}`.
fn contains_all_clause(n: usize) -> String {
    format!(
        "NOT EXISTS (SELECT 1 FROM json_each(?{n}) AS wanted \
         WHERE wanted.value NOT IN (SELECT value FROM json_each(post.images)))"
    )
}

/// SQLite-backed post repository
#[derive(Clone)]
pub struct SqlitePostRepository {
    db: SqlitePool,
}

impl SqlitePostRepository {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    fn encode_images(images: &[String]) -> PostResult<String> {
        serde_json::to_string(images)
            .map_err(|e| PostError::Internal(format!("Failed to encode images: {}", e)))
    }

    fn decode_images(raw: &str) -> PostResult<Vec<String>> {
        serde_json::from_str(raw)
            .map_err(|e| PostError::Internal(format!("Corrupt images column: {}", e)))
    }

    fn row_to_post(row: &SqliteRow) -> PostResult<Post> {
        let images: String = row.try_get("images")?;
        let visibility: String = row.try_get("visibility")?;

        Ok(Post {
            id: row.try_get("id")?,
            owner_id: row.try_get("owner_id")?,
            text: row.try_get("text")?,
            images: Self::decode_images(&images)?,
            visibility: Visibility::from_str(&visibility)
                .map_err(|_| PostError::Internal(format!("Corrupt visibility: {}", visibility)))?,
            parent_id: row.try_get("parent_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl PostRepository for SqlitePostRepository {
    async fn create(&self, post: NewPost) -> PostResult<String> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO post (id, owner_id, text, images, visibility, parent_id, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&id)
        .bind(&post.owner_id)
        .bind(&post.text)
        .bind(Self::encode_images(&post.images)?)
        .bind(post.visibility.as_str())
        .bind(&post.parent_id)
        .bind(now)
        .bind(now)
        .execute(&self.db)
        .await?;

        Ok(id)
    }

    async fn update(&self, update: PostUpdate) -> PostResult<()> {
        let sql = format!(
            r#"
            UPDATE post
            SET text = ?1, images = ?2, visibility = ?3, updated_at = ?4
            WHERE id = ?5 AND owner_id = ?6 AND {}
            "#,
            contains_all_clause(7)
        );

        let result = sqlx::query(&sql)
            .bind(&update.text)
            .bind(Self::encode_images(&update.images)?)
            .bind(update.visibility.as_str())
            .bind(Utc::now())
            .bind(&update.id)
            .bind(&update.owner_id)
            .bind(Self::encode_images(&update.kept_images)?)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(PostError::NotFound(format!(
                "Post {} not found for owner {} with the kept images",
                update.id, update.owner_id
            )));
        }

        Ok(())
    }

    async fn get_images(
        &self,
        id: &str,
        owner_id: &str,
        must_contain: &[String],
    ) -> PostResult<Vec<String>> {
        let sql = format!(
            "SELECT images FROM post WHERE id = ?1 AND owner_id = ?2 AND {}",
            contains_all_clause(3)
        );

        let row = sqlx::query(&sql)
            .bind(id)
            .bind(owner_id)
            .bind(Self::encode_images(must_contain)?)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| {
                PostError::NotFound(format!("Post {} not found for owner {}", id, owner_id))
            })?;

        let images: String = row.try_get("images")?;
        Self::decode_images(&images)
    }

    async fn delete(&self, id: &str, owner_id: &str) -> PostResult<()> {
        let result = sqlx::query("DELETE FROM post WHERE id = ?1 AND owner_id = ?2")
            .bind(id)
            .bind(owner_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(PostError::NotFound(format!(
                "Post {} not found for owner {}",
                id, owner_id
            )));
        }

        Ok(())
    }

    async fn get(&self, id: &str) -> PostResult<Option<Post>> {
        let row = sqlx::query(
            r#"
            SELECT id, owner_id, text, images, visibility, parent_id, created_at, updated_at
            FROM post
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        row.as_ref().map(Self::row_to_post).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn urls(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn new_post(owner: &str, images: &[&str]) -> NewPost {
        NewPost {
            owner_id: owner.to_string(),
            text: "Hello there".to_string(),
            images: urls(images),
            visibility: Visibility::Public,
            parent_id: None,
        }
    }

    async fn repo() -> SqlitePostRepository {
        SqlitePostRepository::new(db::memory_pool().await)
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let repo = repo().await;
        let id = repo.create(new_post("alice", &["u1", "u2"])).await.unwrap();

        let post = repo.get(&id).await.unwrap().unwrap();
        assert_eq!(post.owner_id, "alice");
        assert_eq!(post.images, urls(&["u1", "u2"]));
        assert_eq!(post.visibility, Visibility::Public);
        assert!(post.parent_id.is_none());

        assert!(repo.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reply_requires_existing_parent() {
        let repo = repo().await;
        let parent = repo.create(new_post("alice", &[])).await.unwrap();

        let mut reply = new_post("bob", &[]);
        reply.parent_id = Some(parent.clone());
        let reply_id = repo.create(reply).await.unwrap();
        assert_eq!(
            repo.get(&reply_id).await.unwrap().unwrap().parent_id,
            Some(parent)
        );

        let mut orphan = new_post("bob", &[]);
        orphan.parent_id = Some("no-such-post".to_string());
        assert!(matches!(
            repo.create(orphan).await,
            Err(PostError::Persistence(_))
        ));
    }

    #[tokio::test]
    async fn test_get_images_scoped_to_owner_and_contents() {
        let repo = repo().await;
        let id = repo.create(new_post("alice", &["u1", "u2", "u3"])).await.unwrap();

        assert_eq!(
            repo.get_images(&id, "alice", &[]).await.unwrap(),
            urls(&["u1", "u2", "u3"])
        );
        assert!(repo.get_images(&id, "alice", &urls(&["u1", "u3"])).await.is_ok());

        assert!(matches!(
            repo.get_images(&id, "mallory", &[]).await,
            Err(PostError::NotFound(_))
        ));
        assert!(matches!(
            repo.get_images(&id, "alice", &urls(&["u1", "u9"])).await,
            Err(PostError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_is_conditional_on_kept_images() {
        let repo = repo().await;
        let id = repo.create(new_post("alice", &["u1", "u2"])).await.unwrap();

        let update = PostUpdate {
            id: id.clone(),
            owner_id: "alice".to_string(),
            text: "Edited text".to_string(),
            images: urls(&["u1", "u3"]),
            visibility: Visibility::Private,
            kept_images: urls(&["u1"]),
        };
        repo.update(update.clone()).await.unwrap();

        let post = repo.get(&id).await.unwrap().unwrap();
        assert_eq!(post.text, "Edited text");
        assert_eq!(post.images, urls(&["u1", "u3"]));
        assert_eq!(post.visibility, Visibility::Private);

        // u2 is gone now, so a writer still holding it loses
        let stale = PostUpdate {
            kept_images: urls(&["u2"]),
            ..update.clone()
        };
        assert!(matches!(repo.update(stale).await, Err(PostError::NotFound(_))));

        let foreign = PostUpdate {
            owner_id: "mallory".to_string(),
            ..update
        };
        assert!(matches!(repo.update(foreign).await, Err(PostError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete() {
        let repo = repo().await;
        let id = repo.create(new_post("alice", &[])).await.unwrap();

        assert!(matches!(
            repo.delete(&id, "mallory").await,
            Err(PostError::NotFound(_))
        ));
        repo.delete(&id, "alice").await.unwrap();
        assert!(matches!(
            repo.delete(&id, "alice").await,
            Err(PostError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_deleting_parent_detaches_replies() {
        let repo = repo().await;
        let parent = repo.create(new_post("alice", &[])).await.unwrap();
        let mut reply = new_post("bob", &[]);
        reply.parent_id = Some(parent.clone());
        let reply_id = repo.create(reply).await.unwrap();

        repo.delete(&parent, "alice").await.unwrap();

        let reply = repo.get(&reply_id).await.unwrap().unwrap();
        assert!(reply.parent_id.is_none());
    }
}
