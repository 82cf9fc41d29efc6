//! Configuration management
//!
//! Configuration is read from `config.yml` and then overridden by
//! `SYNCVOTE_*` environment variables. Missing values fall back to defaults,
//! so an absent or empty file yields a runnable development setup.

use serde::{Deserialize, Serialize};

/// Secret used when none is configured. Only suitable for local development.
pub const DEFAULT_JWT_SECRET: &str = "syncvote-development-secret";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    /// Account promoted to admin at startup, if configured
    #[serde(default)]
    pub admin: Option<AdminSeedConfig>,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// Allowed CORS origin
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "http://localhost:3000".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Connection URL, or a file path for SQLite
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/syncvote.db".to_string()
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    #[default]
    Sqlite,
    Mysql,
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub driver: CacheDriver,
    /// Redis connection URL, required when `driver` is `redis`
    #[serde(default)]
    pub redis_url: Option<String>,
    /// Lifetime of the cached user list in seconds
    #[serde(default = "default_ttl")]
    pub ttl_seconds: u64,
    /// Maximum number of entries held by the in-memory backend
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            driver: CacheDriver::default(),
            redis_url: None,
            ttl_seconds: default_ttl(),
            max_capacity: default_max_capacity(),
        }
    }
}

fn default_ttl() -> u64 {
    3600
}

fn default_max_capacity() -> u64 {
    10_000
}

/// Cache driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheDriver {
    #[default]
    Memory,
    Redis,
}

/// Token and session settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret for signing bearer tokens
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    #[serde(default = "default_token_ttl")]
    pub token_ttl_seconds: u64,
    #[serde(default = "default_session_ttl")]
    pub session_ttl_seconds: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
            token_ttl_seconds: default_token_ttl(),
            session_ttl_seconds: default_session_ttl(),
        }
    }
}

impl AuthConfig {
    pub fn uses_default_secret(&self) -> bool {
        self.jwt_secret == DEFAULT_JWT_SECRET
    }
}

fn default_jwt_secret() -> String {
    DEFAULT_JWT_SECRET.to_string()
}

fn default_token_ttl() -> u64 {
    3600
}

fn default_session_ttl() -> u64 {
    3600
}

/// Admin account created on startup when no user has this email yet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminSeedConfig {
    pub email: String,
    pub username: String,
    pub password: String,
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError { path: String, message: String },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from file.
    ///
    /// A missing or empty file yields the default configuration.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file, then apply environment overrides.
    ///
    /// Recognised variables:
    /// - SYNCVOTE_SERVER_HOST, SYNCVOTE_SERVER_PORT, SYNCVOTE_SERVER_CORS_ORIGIN
    /// - SYNCVOTE_DATABASE_DRIVER, SYNCVOTE_DATABASE_URL
    /// - SYNCVOTE_CACHE_DRIVER, SYNCVOTE_CACHE_REDIS_URL, SYNCVOTE_CACHE_TTL_SECONDS
    /// - SYNCVOTE_AUTH_JWT_SECRET, SYNCVOTE_AUTH_TOKEN_TTL_SECONDS,
    ///   SYNCVOTE_AUTH_SESSION_TTL_SECONDS
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("SYNCVOTE_SERVER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = env_parse::<u16>("SYNCVOTE_SERVER_PORT") {
            self.server.port = port;
        }
        if let Ok(origin) = std::env::var("SYNCVOTE_SERVER_CORS_ORIGIN") {
            self.server.cors_origin = origin;
        }

        if let Ok(driver) = std::env::var("SYNCVOTE_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {} // Ignore invalid values
            }
        }
        if let Ok(url) = std::env::var("SYNCVOTE_DATABASE_URL") {
            self.database.url = url;
        }

        if let Ok(driver) = std::env::var("SYNCVOTE_CACHE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "memory" => self.cache.driver = CacheDriver::Memory,
                "redis" => self.cache.driver = CacheDriver::Redis,
                _ => {}
            }
        }
        if let Ok(redis_url) = std::env::var("SYNCVOTE_CACHE_REDIS_URL") {
            self.cache.redis_url = Some(redis_url);
        }
        if let Some(ttl) = env_parse::<u64>("SYNCVOTE_CACHE_TTL_SECONDS") {
            self.cache.ttl_seconds = ttl;
        }

        if let Ok(secret) = std::env::var("SYNCVOTE_AUTH_JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Some(ttl) = env_parse::<u64>("SYNCVOTE_AUTH_TOKEN_TTL_SECONDS") {
            self.auth.token_ttl_seconds = ttl;
        }
        if let Some(ttl) = env_parse::<u64>("SYNCVOTE_AUTH_SESSION_TTL_SECONDS") {
            self.auth.session_ttl_seconds = ttl;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.is_empty() {
            return Err(ConfigError::ValidationError(
                "auth.jwt_secret must not be empty".to_string(),
            ));
        }
        if self.auth.token_ttl_seconds == 0 || self.auth.session_ttl_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "auth TTLs must be greater than zero".to_string(),
            ));
        }
        if let Some(admin) = &self.admin {
            if admin.email.trim().is_empty() || admin.password.is_empty() {
                return Err(ConfigError::ValidationError(
                    "admin seed requires an email and a password".to_string(),
                ));
            }
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse::<T>().ok())
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
