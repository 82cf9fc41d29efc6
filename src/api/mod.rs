//! API layer - HTTP handlers and routing
//!
//! This module contains the HTTP surface of the service:
//! - User and authentication endpoints
//! - Post, vote, and category endpoints
//! - Comment endpoints
//!
//! Routes are grouped by the guards they need; see [`middleware`].

pub mod auth;
pub mod categories;
pub mod comments;
pub mod common;
pub mod middleware;
pub mod posts;
pub mod responses;
pub mod users;

use anyhow::Context;
use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware as axum_middleware,
    routing::{delete, get, patch, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use middleware::{ApiError, AppState};

/// Build the API router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Admin only
    let admin_routes = Router::new()
        .route("/users/{id}", put(users::update_user))
        .route("/users/{id}", delete(users::delete_user))
        .route_layer(axum_middleware::from_fn(middleware::require_admin))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_token,
        ));

    // Token plus the caller's own session
    let self_routes = Router::new()
        .route("/user/me", put(users::update_me))
        .route("/user/password", patch(users::update_password))
        .route("/posts/{id}/Vote", put(posts::vote_post))
        .route("/posts/{id}/comments", post(comments::add_comment))
        .route("/comments/{id}/Vote", put(comments::vote_comment))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_logged_session,
        ))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_token,
        ));

    let post_owner_routes = Router::new()
        .route("/posts/{id}", put(posts::update_post))
        .route("/posts/{id}", delete(posts::delete_post))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_post_owner,
        ))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_token,
        ));

    let comment_owner_routes = Router::new()
        .route("/comments/{id}", put(comments::update_comment))
        .route("/comments/{id}", delete(comments::delete_comment))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_comment_owner,
        ))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_token,
        ));

    // Any valid token
    let protected_routes = Router::new()
        .route("/users", get(users::list_users))
        .route("/users/{id}", get(users::get_user))
        .route("/posts", post(posts::create_post))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_token,
        ));

    Router::new()
        .route("/users", post(users::register))
        .route("/auth/login", post(auth::login))
        .route("/posts", get(posts::list_posts))
        .route("/posts/{id}", get(posts::get_post))
        .route("/PostUser/{id}/posts", get(posts::posts_by_user))
        .route("/categories", get(categories::list_categories))
        .route("/comments/{id}", get(comments::get_comment))
        .route("/PostComments/{id}/comments", get(comments::comments_of_post))
        .merge(admin_routes)
        .merge(self_routes)
        .merge(post_owner_routes)
        .merge(comment_owner_routes)
        .merge(protected_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> anyhow::Result<Router> {
    let origin = cors_origin
        .parse::<HeaderValue>()
        .with_context(|| format!("Invalid CORS origin: {}", cors_origin))?;

    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(middleware::SESSION_HEADER),
        ]);

    Ok(build_api_router(state.clone())
        .fallback(middleware::route_not_found)
        .method_not_allowed_fallback(middleware::route_not_found)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

// ============================================================================
// Tests
// ============================================================================
