//! API middleware
//!
//! Contains the shared application state, the error envelope, and the
//! request guards:
//! - `require_token`: bearer token verification
//! - `require_admin`: admin role
//! - `require_logged_session`: caller is the owner of the `session` header
//! - `require_post_owner` / `require_comment_owner`: admin or creator
//!
//! Guards run in that order; the token guard attaches a [`Principal`] to the
//! request for the guards and handlers behind it.

use axum::{
    extract::{FromRequestParts, Path, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use std::sync::Arc;

use crate::api::responses::Envelope;
use crate::db::Snapshot;
use crate::services::{
    authorize, AccessDenied, Permission, PostService, PostServiceError, Principal, TokenService,
    UserService, UserServiceError,
};

/// Header naming the caller's session
pub const SESSION_HEADER: &str = "session";

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub user_service: Arc<UserService>,
    pub post_service: Arc<PostService>,
    pub tokens: Arc<TokenService>,
}

// ============================================================================
// Errors
// ============================================================================

/// Error response, rendered as the standard envelope
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub data: Option<Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            data: None,
        }
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Unauthorized")
    }

    pub fn forbidden(denied: AccessDenied) -> Self {
        Self::new(StatusCode::FORBIDDEN, denied.to_string())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    /// 400 with the list of offending fields
    pub fn bad_request(details: Value) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: "Bad request.".to_string(),
            data: Some(details),
        }
    }

    /// 500 exposing the error chain in `data`
    pub fn internal(error: &anyhow::Error) -> Self {
        tracing::error!(error = ?error, "Request failed");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "Internal server error".to_string(),
            data: Some(Value::String(format!("{:#}", error))),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let envelope = Envelope {
            status: self.status.as_u16(),
            message: self.message,
            data: self.data,
        };
        (self.status, Json(envelope)).into_response()
    }
}

impl From<AccessDenied> for ApiError {
    fn from(denied: AccessDenied) -> Self {
        Self::forbidden(denied)
    }
}

impl From<UserServiceError> for ApiError {
    fn from(error: UserServiceError) -> Self {
        match error {
            UserServiceError::AuthenticationError => Self::unauthorized(),
            UserServiceError::UserExists => Self::conflict(error.to_string()),
            UserServiceError::NotFound => Self::not_found(error.to_string()),
            UserServiceError::InternalError(e) => Self::internal(&e),
        }
    }
}

impl From<PostServiceError> for ApiError {
    fn from(error: PostServiceError) -> Self {
        match error {
            PostServiceError::PostNotFound | PostServiceError::CommentNotFound => {
                Self::not_found(error.to_string())
            }
            PostServiceError::InternalError(e) => Self::internal(&e),
        }
    }
}

// ============================================================================
// Principal extraction
// ============================================================================

/// Handlers behind `require_token` take the caller as an argument
impl<S: Send + Sync> FromRequestParts<S> for Principal {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .ok_or_else(ApiError::unauthorized)
    }
}

/// Token from `Authorization: Bearer <token>`.
///
/// The header must be exactly two space-separated parts.
fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) if !token.is_empty() => Some(token),
        _ => None,
    }
}

fn session_id(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(SESSION_HEADER)?
        .to_str()
        .ok()
        .filter(|s| !s.is_empty())
}

fn principal_of(request: &Request) -> Result<&Principal, ApiError> {
    request
        .extensions()
        .get::<Principal>()
        .ok_or_else(ApiError::unauthorized)
}

// ============================================================================
// Guards
// ============================================================================

/// Authentication middleware
pub async fn require_token(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer_token(request.headers()).ok_or_else(ApiError::unauthorized)?;

    let claims = state.tokens.verify(token).map_err(|e| {
        tracing::debug!(error = %e, "Rejected bearer token");
        ApiError::unauthorized()
    })?;

    request
        .extensions_mut()
        .insert(Principal::new(claims.id, claims.role));
    Ok(next.run(request).await)
}

/// Admin authorization middleware
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    authorize(principal_of(&request)?, Permission::Admin)?;
    Ok(next.run(request).await)
}

/// Self-service guard: the `session` header must name a live session of the
/// token's user.
pub async fn require_logged_session(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let principal = principal_of(&request)?.clone();
    let session = session_id(request.headers()).map(str::to_owned);

    let session_user_id = match session {
        Some(id) => state.user_service.resolve_session(&id).await?,
        None => None,
    };
    authorize(
        &principal,
        Permission::SessionOwner {
            session_user_id: session_user_id.as_deref(),
        },
    )?;

    Ok(next.run(request).await)
}

/// Admin-or-creator guard for `/posts/{id}`
pub async fn require_post_owner(
    State(state): State<AppState>,
    Path(id): Path<String>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let principal = principal_of(&request)?.clone();

    let owner_id = match state.post_service.get_post(&id).await? {
        Snapshot::Found(post) => post.created_by,
        Snapshot::NotFound => return Err(PostServiceError::PostNotFound.into()),
    };
    authorize(&principal, Permission::AdminOrOwner { owner_id: &owner_id })?;

    Ok(next.run(request).await)
}

/// Admin-or-creator guard for `/comments/{id}`
pub async fn require_comment_owner(
    State(state): State<AppState>,
    Path(id): Path<String>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let principal = principal_of(&request)?.clone();

    let owner_id = match state.post_service.get_comment(&id).await? {
        Snapshot::Found(comment) => comment.created_by,
        Snapshot::NotFound => return Err(PostServiceError::CommentNotFound.into()),
    };
    authorize(&principal, Permission::AdminOrOwner { owner_id: &owner_id })?;

    Ok(next.run(request).await)
}

/// Fallback for unmatched routes
pub async fn route_not_found() -> ApiError {
    ApiError::not_found("Route not found")
}

// ============================================================================
// Tests
// ============================================================================
