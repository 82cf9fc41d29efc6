//! Authentication API endpoints
//!
//! - POST /auth/login - check credentials, issue a bearer token and a session

use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::api::common::{Validate, ValidJson, FieldError, Validator};
use crate::api::middleware::{ApiError, AppState};
use crate::api::responses::ApiResponse;
use crate::models::UserProfile;
use crate::services::LoginInput;

/// Request body for user login
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl Validate for LoginRequest {
    fn validate(&self) -> Vec<FieldError> {
        Validator::new()
            .email("email", &self.email, "Email is required")
            .non_empty("password", &self.password, "Password is required")
            .finish()
    }
}

/// Response for a successful login
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user: UserProfile,
    pub token: String,
    /// Sent back in the `session` header on self-service routes
    pub session_id: String,
}

/// POST /auth/login - User login
pub async fn login(
    State(state): State<AppState>,
    ValidJson(body): ValidJson<LoginRequest>,
) -> Result<ApiResponse<LoginResponse>, ApiError> {
    let outcome = state
        .user_service
        .login(LoginInput::new(body.email, body.password))
        .await?;

    Ok(ApiResponse::ok(
        "User logged in successfully!",
        LoginResponse {
            user: outcome.user,
            token: outcome.token,
            session_id: outcome.session_id,
        },
    ))
}
