/// Post data models
use crate::error::{PostError, PostResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who may view a post
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
    Followers,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
            Visibility::Followers => "followers",
        }
    }

    /// Parse the exact lowercase form used on the wire and in the database
    pub fn from_str(s: &str) -> PostResult<Self> {
        match s {
            "public" => Ok(Visibility::Public),
            "private" => Ok(Visibility::Private),
            "followers" => Ok(Visibility::Followers),
            _ => Err(PostError::Validation(
                "visibility: Please select a valid visibility option.".to_string(),
            )),
        }
    }
}

/// Stored post record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub owner_id: String,
    pub text: String,
    pub images: Vec<String>,
    pub visibility: Visibility,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    /// Whether `viewer` may read this post.
    ///
    /// There is no follower graph in this service, so followers-only posts
    /// are visible to their owner alone.
    pub fn is_visible_to(&self, viewer: Option<&str>) -> bool {
        match self.visibility {
            Visibility::Public => true,
            Visibility::Private | Visibility::Followers => viewer == Some(self.owner_id.as_str()),
        }
    }
}

/// Fields for a new post
#[derive(Debug, Clone)]
pub struct NewPost {
    pub owner_id: String,
    pub text: String,
    pub images: Vec<String>,
    pub visibility: Visibility,
    pub parent_id: Option<String>,
}

/// Replacement fields for an existing post
#[derive(Debug, Clone)]
pub struct PostUpdate {
    pub id: String,
    pub owner_id: String,
    pub text: String,
    pub images: Vec<String>,
    pub visibility: Visibility,
    /// URLs the caller kept from the previous version; the write only
    /// applies while the stored post still contains all of them.
    pub kept_images: Vec<String>,
}

/// Response carrying the id of the post a use case acted on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostIdResponse {
    pub id: String,
}
