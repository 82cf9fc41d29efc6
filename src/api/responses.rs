//! Shared API response types
//!
//! Every response, success or failure, is the same envelope:
//! `{status, message, data?}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::models::{Comment, Post};

/// Response envelope
#[derive(Debug, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub status: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

/// Successful handler result
#[derive(Debug)]
pub struct ApiResponse<T> {
    status: StatusCode,
    message: &'static str,
    data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(message: &'static str, data: T) -> Self {
        Self {
            status: StatusCode::OK,
            message,
            data: Some(data),
        }
    }

    pub fn created(message: &'static str, data: T) -> Self {
        Self {
            status: StatusCode::CREATED,
            message,
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    /// Success without a `data` field
    pub fn message(message: &'static str) -> Self {
        Self {
            status: StatusCode::OK,
            message,
            data: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let envelope = Envelope {
            status: self.status.as_u16(),
            message: self.message.to_string(),
            data: self.data,
        };
        (self.status, Json(envelope)).into_response()
    }
}

// ============================================================================
// Payloads
// ============================================================================

/// `data` of a create response
#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedId {
    pub id: String,
}

impl CreatedId {
    pub fn new(id: String) -> Self {
        Self { id }
    }
}

/// Posts of one user
#[derive(Debug, Serialize)]
pub struct UserPosts {
    pub id: String,
    pub posts: Vec<Post>,
}

/// Comments of one post
#[derive(Debug, Serialize)]
pub struct PostComments {
    pub id: String,
    pub comments: Vec<Comment>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::{json, Value};

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_created_envelope() {
        let response = ApiResponse::created("Post created successfully!", CreatedId::new("p1".into()))
            .into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(
            body_json(response).await,
            json!({"status": 201, "message": "Post created successfully!", "data": {"id": "p1"}})
        );
    }

    #[tokio::test]
    async fn test_message_only_envelope_omits_data() {
        let response = ApiResponse::message("Post deleted successfully!").into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({"status": 200, "message": "Post deleted successfully!"})
        );
    }
}
