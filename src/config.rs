/// Configuration management for the post service
use crate::error::{PostError, PostResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub authentication: AuthConfig,
    pub limits: PostLimits,
    pub rate_limit: RateLimitSettings,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    /// Base URL that public blob URLs are built from
    pub public_url: String,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub database: PathBuf,
    pub blob_location: PathBuf,
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

/// Shape and size limits applied to post submissions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostLimits {
    pub text_min_chars: usize,
    pub text_max_chars: usize,
    pub max_images: usize,
    pub max_image_bytes: usize,
}

impl Default for PostLimits {
    fn default() -> Self {
        Self {
            text_min_chars: 5,
            text_max_chars: 2000,
            max_images: 4,
            max_image_bytes: 5 * 1024 * 1024, // 5MB
        }
    }
}

impl PostLimits {
    /// Largest multipart body a well-formed submission can produce
    pub fn max_body_bytes(&self) -> usize {
        self.max_images * self.max_image_bytes + 1024 * 1024
    }
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSettings {
    pub enabled: bool,
    pub authenticated_rps: u32,
    pub unauthenticated_rps: u32,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

/// Read an environment variable, falling back to a default when it is
/// missing or does not parse.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> PostResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("POSTS_HOSTNAME").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("POSTS_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|_| PostError::Validation("Invalid port number".to_string()))?;
        let public_url = env::var("POSTS_PUBLIC_URL")
            .unwrap_or_else(|_| format!("http://{}:{}", hostname, port))
            .trim_end_matches('/')
            .to_string();

        let data_directory: PathBuf = env::var("POSTS_DATA_DIRECTORY")
            .unwrap_or_else(|_| "./data".to_string())
            .into();
        let database = env::var("POSTS_DATABASE_LOCATION")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("posts.sqlite"));
        let blob_location = env::var("POSTS_BLOBSTORE_DISK_LOCATION")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("blobs"));

        let jwt_secret = env::var("POSTS_JWT_SECRET")
            .map_err(|_| PostError::Validation("JWT secret required".to_string()))?;

        let defaults = PostLimits::default();
        let limits = PostLimits {
            text_min_chars: env_or("POSTS_TEXT_MIN_CHARS", defaults.text_min_chars),
            text_max_chars: env_or("POSTS_TEXT_MAX_CHARS", defaults.text_max_chars),
            max_images: env_or("POSTS_MAX_IMAGES", defaults.max_images),
            max_image_bytes: env_or("POSTS_MAX_IMAGE_BYTES", defaults.max_image_bytes),
        };

        let rate_limit = RateLimitSettings {
            enabled: env_or("POSTS_RATE_LIMITS_ENABLED", true),
            authenticated_rps: env_or("POSTS_RATE_LIMIT_AUTHENTICATED_RPS", 50),
            unauthenticated_rps: env_or("POSTS_RATE_LIMIT_UNAUTHENTICATED_RPS", 10),
        };

        let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                public_url,
            },
            storage: StorageConfig {
                data_directory,
                database,
                blob_location,
            },
            authentication: AuthConfig { jwt_secret },
            limits,
            rate_limit,
            logging: LoggingConfig { level: log_level },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> PostResult<()> {
        if self.service.hostname.is_empty() {
            return Err(PostError::Validation("Hostname cannot be empty".to_string()));
        }

        if self.authentication.jwt_secret.len() < 32 {
            return Err(PostError::Validation(
                "JWT secret must be at least 32 characters".to_string(),
            ));
        }

        if self.limits.text_min_chars > self.limits.text_max_chars {
            return Err(PostError::Validation(format!(
                "Minimum text length {} exceeds maximum {}",
                self.limits.text_min_chars, self.limits.text_max_chars
            )));
        }

        if self.limits.max_image_bytes == 0 {
            return Err(PostError::Validation(
                "Maximum image size must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Valid configuration pointing at the default local paths
    #[cfg(test)]
    pub fn for_tests() -> Self {
        ServerConfig {
            service: ServiceConfig {
                hostname: "localhost".to_string(),
                port: 3000,
                public_url: "http://localhost:3000".to_string(),
            },
            storage: StorageConfig {
                data_directory: "./data".into(),
                database: "./data/posts.sqlite".into(),
                blob_location: "./data/blobs".into(),
            },
            authentication: AuthConfig {
                jwt_secret: "a".repeat(32),
            },
            limits: PostLimits::default(),
            rate_limit: RateLimitSettings {
                enabled: true,
                authenticated_rps: 50,
                unauthenticated_rps: 10,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}
