//! User API endpoints
//!
//! - POST /users - register (public)
//! - GET /users, GET /users/{id} - read (token)
//! - PUT /users/{id}, DELETE /users/{id} - manage (admin)
//! - PUT /user/me, PATCH /user/password - self-service (token + own session)

use axum::extract::{Path, State};
use serde::Deserialize;

use crate::api::common::{FieldError, Validate, ValidJson, Validator};
use crate::api::middleware::{ApiError, AppState};
use crate::api::responses::{ApiResponse, CreatedId};
use crate::models::{UserProfile, UserRole};
use crate::services::{Principal, ProfileUpdate, RegisterInput};

/// Request body for registration
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub username: String,
}

impl Validate for RegisterRequest {
    fn validate(&self) -> Vec<FieldError> {
        Validator::new()
            .email("email", &self.email, "Email is required")
            .non_empty("password", &self.password, "Password is required")
            .non_empty("username", &self.username, "Username is required")
            .finish()
    }
}

/// Request body for profile updates. `role` only counts on the admin route.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub role: Option<UserRole>,
}

impl Validate for UpdateUserRequest {
    fn validate(&self) -> Vec<FieldError> {
        let mut validator = Validator::new();
        if let Some(email) = &self.email {
            validator.email("email", email, "Email is in the wrong format");
        }
        if let Some(username) = &self.username {
            validator.non_empty("username", username, "Username is required");
        }
        validator.finish()
    }
}

/// Request body for a password change
#[derive(Debug, Deserialize)]
pub struct PasswordRequest {
    pub password: String,
}

impl Validate for PasswordRequest {
    fn validate(&self) -> Vec<FieldError> {
        Validator::new()
            .non_empty("password", &self.password, "Password is required")
            .finish()
    }
}

/// POST /users - Register
pub async fn register(
    State(state): State<AppState>,
    ValidJson(body): ValidJson<RegisterRequest>,
) -> Result<ApiResponse<CreatedId>, ApiError> {
    let id = state
        .user_service
        .create_user(RegisterInput::new(body.email, body.username, body.password))
        .await?;

    Ok(ApiResponse::created("User created successfully!", CreatedId::new(id)))
}

/// GET /users - List users (may be served from cache)
pub async fn list_users(
    State(state): State<AppState>,
) -> Result<ApiResponse<Vec<UserProfile>>, ApiError> {
    let users = state.user_service.get_users().await?;
    Ok(ApiResponse::ok("Users retrieved successfully!", users))
}

/// GET /users/{id}
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ApiResponse<UserProfile>, ApiError> {
    let user = state.user_service.get_user_by_id(&id).await?;
    Ok(ApiResponse::ok("User fetched successfully!", user))
}

/// PUT /users/{id} - Admin update, may change the role
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ValidJson(body): ValidJson<UpdateUserRequest>,
) -> Result<ApiResponse<UserProfile>, ApiError> {
    let update = ProfileUpdate {
        email: body.email,
        username: body.username,
        role: body.role,
    };
    let user = state.user_service.update_user(&id, update).await?;
    Ok(ApiResponse::ok("User updated successfully!", user))
}

/// PUT /user/me - Update own profile
pub async fn update_me(
    State(state): State<AppState>,
    principal: Principal,
    ValidJson(body): ValidJson<UpdateUserRequest>,
) -> Result<ApiResponse<UserProfile>, ApiError> {
    // No self-promotion
    let update = ProfileUpdate {
        email: body.email,
        username: body.username,
        role: None,
    };
    let user = state
        .user_service
        .update_user(&principal.user_id, update)
        .await?;
    Ok(ApiResponse::ok("User updated successfully!", user))
}

/// PATCH /user/password - Change own password
pub async fn update_password(
    State(state): State<AppState>,
    principal: Principal,
    ValidJson(body): ValidJson<PasswordRequest>,
) -> Result<ApiResponse<()>, ApiError> {
    state
        .user_service
        .update_user_password(&principal.user_id, &body.password)
        .await?;
    Ok(ApiResponse::message("User updated successfully!"))
}

/// DELETE /users/{id}
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ApiResponse<()>, ApiError> {
    state.user_service.delete_user(&id).await?;
    Ok(ApiResponse::message("User deleted successfully!"))
}
