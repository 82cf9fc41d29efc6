//! Comment API endpoints
//!
//! - POST /posts/{id}/comments - comment on a post (token + own session)
//! - GET /comments/{id}, GET /PostComments/{id}/comments - read
//! - PUT /comments/{id}, DELETE /comments/{id} - admin or creator
//! - PUT /comments/{id}/Vote - vote (token + own session)

use axum::extract::{Path, State};
use serde::Deserialize;

use crate::api::common::{FieldError, Validate, ValidJson, Validator};
use crate::api::middleware::{ApiError, AppState};
use crate::api::posts::VoteRequest;
use crate::api::responses::{ApiResponse, CreatedId, PostComments};
use crate::models::Comment;
use crate::services::Principal;

/// Request body for adding a comment
#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub description: String,
}

impl Validate for CreateCommentRequest {
    fn validate(&self) -> Vec<FieldError> {
        Validator::new()
            .non_empty(
                "description",
                &self.description,
                "Comment description required and as a string",
            )
            .finish()
    }
}

/// Request body for editing a comment
#[derive(Debug, Deserialize)]
pub struct UpdateCommentRequest {
    pub description: String,
}

impl Validate for UpdateCommentRequest {
    fn validate(&self) -> Vec<FieldError> {
        Vec::new()
    }
}

/// POST /posts/{id}/comments
pub async fn add_comment(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    principal: Principal,
    ValidJson(body): ValidJson<CreateCommentRequest>,
) -> Result<ApiResponse<CreatedId>, ApiError> {
    let id = state
        .post_service
        .add_comment(&post_id, body.description, &principal.user_id)
        .await?;

    Ok(ApiResponse::created("Comment added successfully!", CreatedId::new(id)))
}

/// GET /comments/{id}
pub async fn get_comment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ApiResponse<Comment>, ApiError> {
    let comment = state.post_service.get_comment_by_id(&id).await?;
    Ok(ApiResponse::ok("Comment fetched successfully!", comment))
}

/// GET /PostComments/{id}/comments
pub async fn comments_of_post(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> Result<ApiResponse<PostComments>, ApiError> {
    let comments = state.post_service.get_comments_of_post(&post_id).await?;
    Ok(ApiResponse::ok(
        "Comments fetched successfully!",
        PostComments {
            id: post_id,
            comments,
        },
    ))
}

/// PUT /comments/{id}
pub async fn update_comment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ValidJson(body): ValidJson<UpdateCommentRequest>,
) -> Result<ApiResponse<Comment>, ApiError> {
    let comment = state
        .post_service
        .update_comment(&id, Some(body.description))
        .await?;
    Ok(ApiResponse::ok("Comment updated successfully!", comment))
}

/// PUT /comments/{id}/Vote
pub async fn vote_comment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ValidJson(body): ValidJson<VoteRequest>,
) -> Result<ApiResponse<Comment>, ApiError> {
    let comment = state
        .post_service
        .vote_comment(&id, body.vote_count.as_ref())
        .await?;
    Ok(ApiResponse::ok("Comment updated successfully!", comment))
}

/// DELETE /comments/{id}
pub async fn delete_comment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ApiResponse<()>, ApiError> {
    state.post_service.delete_comment(&id).await?;
    Ok(ApiResponse::message("Comment deleted successfully!"))
}
