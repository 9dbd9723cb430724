/// Unified error types for the post service
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Message shown for every failure the caller cannot correct themselves
pub const GENERIC_FAILURE_MESSAGE: &str = "Something went wrong. Please try again later.";

/// Message shown when no valid session is attached to the request
pub const SIGN_IN_MESSAGE: &str = "Please sign in and try again.";

/// Main error type for the post service
#[derive(Error, Debug)]
pub enum PostError {
    /// Bad shape, size or enum value in a submission
    #[error("Validation error: {0}")]
    Validation(String),

    /// No session, or the session could not be verified
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Post absent, not owned by the caller, or its images changed underneath us
    #[error("Not found: {0}")]
    NotFound(String),

    /// Blob upload or delete failure
    #[error("Blob storage error: {0}")]
    Storage(String),

    /// Database errors
    #[error("Database error: {0}")]
    Persistence(#[from] sqlx::Error),

    /// Rate limiting errors
    #[error("Rate limit exceeded")]
    RateLimitExceeded { retry_after: std::time::Duration },

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PostError {
    /// Message that is safe to show to the caller.
    ///
    /// Only validation failures are specific enough to guide a correction;
    /// everything else collapses to a generic message.
    pub fn public_message(&self) -> String {
        match self {
            PostError::Validation(message) => message.clone(),
            PostError::Authentication(_) => SIGN_IN_MESSAGE.to_string(),
            PostError::RateLimitExceeded { .. } => {
                "Too many requests. Please try again later.".to_string()
            }
            _ => GENERIC_FAILURE_MESSAGE.to_string(),
        }
    }
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Convert PostError to HTTP response
impl IntoResponse for PostError {
    fn into_response(self) -> Response {
        let (status, error_code) = match &self {
            PostError::Validation(_) => (StatusCode::BAD_REQUEST, "InvalidRequest"),
            PostError::Authentication(_) => (StatusCode::UNAUTHORIZED, "AuthenticationRequired"),
            PostError::NotFound(_) => (StatusCode::NOT_FOUND, "NotFound"),
            PostError::RateLimitExceeded { .. } => {
                (StatusCode::TOO_MANY_REQUESTS, "RateLimitExceeded")
            }
            PostError::Storage(_)
            | PostError::Persistence(_)
            | PostError::Internal(_)
            | PostError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "InternalServerError"),
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::warn!(error = %self, "request rejected");
        }

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message: self.public_message(),
        });

        if let PostError::RateLimitExceeded { retry_after } = &self {
            let seconds = retry_after.as_secs().max(1).to_string();
            return (status, [(header::RETRY_AFTER, seconds)], body).into_response();
        }

        (status, body).into_response()
    }
}

/// Result type alias for post service operations
pub type PostResult<T> = Result<T, PostError>;
