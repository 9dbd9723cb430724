/// Session resolution for incoming requests
use crate::{
    api::middleware::extract_bearer_token,
    context::AppContext,
    error::{PostError, PostResult},
};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

/// Identity of the caller, resolved once per request.
///
/// Extraction never fails: a missing or invalid token yields an anonymous
/// session, and the use cases decide whether they need a user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    user_id: Option<String>,
}

impl Session {
    /// Session with no signed-in user
    pub fn anonymous() -> Self {
        Self { user_id: None }
    }

    /// Session for a signed-in user
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
        }
    }

    /// Signed-in user, if any
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Signed-in user, or an authentication error
    pub fn current_user_id(&self) -> PostResult<&str> {
        self.user_id()
            .ok_or_else(|| PostError::Authentication("No active session".to_string()))
    }
}

#[async_trait]
impl FromRequestParts<AppContext> for Session {
    type Rejection = PostError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = extract_bearer_token(&parts.headers) else {
            return Ok(Session::anonymous());
        };

        match verify_session_token(&token, &state.config.authentication.jwt_secret) {
            Ok(user_id) => Ok(Session::for_user(user_id)),
            Err(e) => {
                tracing::warn!("Ignoring invalid session token: {}", e);
                Ok(Session::anonymous())
            }
        }
    }
}

/// Verify a JWT token with full validation
///
/// This performs:
/// 1. JWT signature verification
/// 2. Expiration checking
/// 3. Claims validation
pub fn verify_jwt_token(
    token: &str,
    jwt_secret: &str,
) -> Result<jsonwebtoken::TokenData<serde_json::Value>, PostError> {
    use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

    let decoding_key = DecodingKey::from_secret(jwt_secret.as_bytes());
    let mut validation = Validation::new(Algorithm::HS256);
    // Allow some clock skew (5 minutes)
    validation.leeway = 300;

    decode::<serde_json::Value>(token, &decoding_key, &validation).map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
            PostError::Authentication("Token has expired".to_string())
        }
        jsonwebtoken::errors::ErrorKind::InvalidSignature => {
            PostError::Authentication("Invalid token signature".to_string())
        }
        _ => PostError::Authentication(format!("Invalid token: {}", e)),
    })
}

/// Verify a session token and return the user id from its `sub` claim
pub fn verify_session_token(token: &str, jwt_secret: &str) -> PostResult<String> {
    let token_data = verify_jwt_token(token, jwt_secret)?;

    token_data
        .claims
        .get("sub")
        .and_then(|v| v.as_str())
        .filter(|sub| !sub.is_empty())
        .map(String::from)
        .ok_or_else(|| PostError::Authentication("Invalid JWT: missing 'sub' claim".to_string()))
}

/// Sign a session token for `user_id`, valid for `ttl_secs`
#[cfg(test)]
pub fn issue_test_token(user_id: &str, jwt_secret: &str, ttl_secs: i64) -> String {
    use jsonwebtoken::{encode, EncodingKey, Header};

    let claims = serde_json::json!({
        "sub": user_id,
        "exp": chrono::Utc::now().timestamp() + ttl_secs,
    });
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
    .unwrap()
}
