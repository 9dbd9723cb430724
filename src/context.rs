/// Application context and dependency injection
use crate::{
    blob_store::BlobStore,
    config::ServerConfig,
    db,
    error::{PostError, PostResult},
    posts::{PostService, SqlitePostRepository},
    rate_limit::RateLimiter,
    validation::PostValidator,
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub blob_store: BlobStore,
    pub posts: PostService,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> PostResult<Self> {
        // Validate configuration
        config.validate()?;

        // Create data directories if they don't exist
        Self::ensure_directories(&config).await?;

        let db = db::create_pool(&config.storage.database, db::DatabaseOptions::default()).await?;
        db::run_migrations(&db).await?;
        db::test_connection(&db).await?;

        let blob_store = BlobStore::disk(
            config.storage.blob_location.clone(),
            db.clone(),
            &config.service.public_url,
        );

        tracing::info!(
            "Storing posts in {:?} and blobs in {:?}",
            config.storage.database,
            config.storage.blob_location
        );

        Ok(Self::assemble(config, db, blob_store))
    }

    /// Wire services over an open database and blob store
    pub fn assemble(config: ServerConfig, db: SqlitePool, blob_store: BlobStore) -> Self {
        let posts = PostService::new(
            Arc::new(SqlitePostRepository::new(db.clone())),
            blob_store.clone(),
            PostValidator::new(config.limits),
        );
        let rate_limiter = Arc::new(RateLimiter::new(&config.rate_limit));

        Self {
            config: Arc::new(config),
            db,
            blob_store,
            posts,
            rate_limiter,
        }
    }

    /// Ensure all required directories exist
    async fn ensure_directories(config: &ServerConfig) -> PostResult<()> {
        let dirs = [
            &config.storage.data_directory,
            &config.storage.blob_location,
        ];

        for dir in dirs {
            if !dir.exists() {
                tokio::fs::create_dir_all(dir).await.map_err(|e| {
                    PostError::Internal(format!("Failed to create directory {:?}: {}", dir, e))
                })?;
            }
        }

        Ok(())
    }
}
