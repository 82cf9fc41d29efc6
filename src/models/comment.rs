//! Comment model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A comment on a post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub description: String,
    #[serde(default)]
    pub vote_count: i64,
    /// Post the comment belongs to. Not used for authorization.
    pub post_id: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Document body written when a comment is created
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    pub description: String,
    pub vote_count: i64,
    pub post_id: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NewComment {
    pub fn new(description: String, post_id: String, created_by: String) -> Self {
        let now = Utc::now();
        Self {
            description,
            vote_count: 0,
            post_id,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update of a comment
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}
