//! Post API endpoints
//!
//! - POST /posts - create (token)
//! - GET /posts[?category=], GET /posts/{id}, GET /PostUser/{id}/posts - read
//! - PUT /posts/{id}, DELETE /posts/{id} - admin or creator
//! - PUT /posts/{id}/Vote - vote (token + own session)

use axum::extract::{Path, Query, State};
use serde::Deserialize;
use serde_json::Value;

use crate::api::common::{FieldError, Validate, ValidJson, Validator};
use crate::api::middleware::{ApiError, AppState};
use crate::api::responses::{ApiResponse, CreatedId, UserPosts};
use crate::models::{Post, PostPatch};
use crate::services::{CreatePostInput, Principal};

/// Request body for creating a post
#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    pub description: String,
    pub categories: Vec<String>,
}

impl Validate for CreatePostRequest {
    fn validate(&self) -> Vec<FieldError> {
        Validator::new()
            .non_empty("title", &self.title, "Title is required")
            .non_empty("description", &self.description, "Description is required")
            .non_empty_list("categories", &self.categories, "At least one category is required")
            .finish()
    }
}

/// Partial update; every field is optional
impl Validate for PostPatch {
    fn validate(&self) -> Vec<FieldError> {
        Vec::new()
    }
}

/// Request body for a vote. Only `1` and `-1` are counted.
#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    #[serde(rename = "voteCount", default)]
    pub vote_count: Option<Value>,
}

impl Validate for VoteRequest {
    fn validate(&self) -> Vec<FieldError> {
        Vec::new()
    }
}

/// Query parameters for listing posts
#[derive(Debug, Deserialize)]
pub struct ListPostsQuery {
    pub category: Option<String>,
}

/// POST /posts - Create a post owned by the caller
pub async fn create_post(
    State(state): State<AppState>,
    principal: Principal,
    ValidJson(body): ValidJson<CreatePostRequest>,
) -> Result<ApiResponse<CreatedId>, ApiError> {
    let input = CreatePostInput::new(body.title, body.description, body.categories);
    let id = state
        .post_service
        .create_post(input, &principal.user_id)
        .await?;

    Ok(ApiResponse::created("Post created successfully!", CreatedId::new(id)))
}

/// GET /posts - All posts, or those in `?category=`
pub async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<ListPostsQuery>,
) -> Result<ApiResponse<Vec<Post>>, ApiError> {
    let posts = state
        .post_service
        .get_posts(query.category.as_deref())
        .await?;
    Ok(ApiResponse::ok("Posts retrieved successfully!", posts))
}

/// GET /posts/{id}
pub async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ApiResponse<Post>, ApiError> {
    let post = state.post_service.get_post_by_id(&id).await?;
    Ok(ApiResponse::ok("Post fetched successfully!", post))
}

/// GET /PostUser/{id}/posts - Posts created by a user
pub async fn posts_by_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ApiResponse<UserPosts>, ApiError> {
    let posts = state.post_service.get_posts_by_user(&id).await?;
    Ok(ApiResponse::ok(
        "Posts retrieved successfully!",
        UserPosts { id, posts },
    ))
}

/// PUT /posts/{id}
pub async fn update_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ValidJson(patch): ValidJson<PostPatch>,
) -> Result<ApiResponse<Post>, ApiError> {
    let post = state.post_service.update_post(&id, patch).await?;
    Ok(ApiResponse::ok("Post updated successfully!", post))
}

/// PUT /posts/{id}/Vote
pub async fn vote_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ValidJson(body): ValidJson<VoteRequest>,
) -> Result<ApiResponse<Post>, ApiError> {
    let post = state
        .post_service
        .vote_post(&id, body.vote_count.as_ref())
        .await?;
    Ok(ApiResponse::ok("Post updated successfully!", post))
}

/// DELETE /posts/{id}
pub async fn delete_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ApiResponse<()>, ApiError> {
    state.post_service.delete_post(&id).await?;
    Ok(ApiResponse::message("Post deleted successfully!"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_create_post_validation() {
        let body: CreatePostRequest = serde_json::from_value(json!({
            "title": "",
            "description": "D",
            "categories": []
        }))
        .unwrap();
        let fields: Vec<String> = body.validate().into_iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["title", "categories"]);
    }

    #[test]
    fn test_vote_body_accepts_any_json_type() {
        let body: VoteRequest = serde_json::from_value(json!({"voteCount": "up"})).unwrap();
        assert_eq!(body.vote_count, Some(json!("up")));

        let body: VoteRequest = serde_json::from_value(json!({})).unwrap();
        assert_eq!(body.vote_count, None);
    }
}
