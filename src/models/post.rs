//! Post model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A post as stored and returned by the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub title: String,
    pub description: String,
    pub categories: Vec<String>,
    #[serde(default)]
    pub vote_count: i64,
    /// Author's user id; never reassigned
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    /// Overlay the fields set in `patch`
    pub fn apply(&mut self, patch: &PostPatch) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(description) = &patch.description {
            self.description = description.clone();
        }
        if let Some(categories) = &patch.categories {
            self.categories = categories.clone();
        }
        if let Some(updated_at) = patch.updated_at {
            self.updated_at = updated_at;
        }
    }
}

/// Document body written when a post is created
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPost {
    pub title: String,
    pub description: String,
    pub categories: Vec<String>,
    pub vote_count: i64,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NewPost {
    pub fn new(
        title: String,
        description: String,
        categories: Vec<String>,
        created_by: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            title,
            description,
            categories,
            vote_count: 0,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update of a post. Ownership and votes are not patchable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<String>>,
    #[serde(skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}
