//! SyncVote - discussion and voting backend

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use syncvote::{
    api::{self, AppState},
    cache::create_cache,
    config::Config,
    db::{self, SqlxDocumentStore},
    services::{PostService, TokenService, UserService},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "syncvote=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting SyncVote...");

    // Load configuration
    let config = Config::load_with_env(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");
    if config.auth.uses_default_secret() {
        tracing::warn!("Using the built-in JWT secret; set auth.jwt_secret or SYNCVOTE_AUTH_JWT_SECRET");
    }

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    pool.ping().await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    // Run migrations
    db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    // Initialize cache
    let cache = create_cache(&config.cache).await?;
    tracing::info!("Cache initialized: {:?}", config.cache.driver);

    // Initialize services
    let store = SqlxDocumentStore::boxed(pool.clone());
    let tokens = Arc::new(TokenService::from_config(&config.auth));
    let user_service = UserService::new(store.clone(), cache, tokens.clone()).with_ttls(
        Duration::from_secs(config.auth.session_ttl_seconds),
        Duration::from_secs(config.cache.ttl_seconds),
    );
    let post_service = PostService::new(store);

    if let Some(admin) = &config.admin {
        let id = user_service.ensure_admin(admin).await?;
        tracing::info!(user_id = %id, "Admin account ready: {}", admin.email);
    }

    let state = AppState {
        user_service: Arc::new(user_service),
        post_service: Arc::new(post_service),
        tokens,
    };

    // Build router
    let app = api::build_router(state, &config.server.cors_origin)?;

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutdown signal received");
}
