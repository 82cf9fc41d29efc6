//! Session model
//!
//! A session is an opaque id mapped to a user id in the cache. Nothing about
//! it is persisted in the document store.

use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    pub user_id: String,
}

impl Session {
    /// Start a new session with a random id
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
        }
    }

    /// Cache key holding the user id for session `id`
    pub fn cache_key(id: &str) -> String {
        format!("session:{}", id)
    }
}
