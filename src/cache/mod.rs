//! Cache layer
//!
//! Expiring key-value storage used for session lookup and the cached user
//! list. Two backends:
//! - In-memory cache (moka), the default for a single instance
//! - Redis, behind the `redis-cache` feature, for shared deployments
//!
//! Values are plain strings. The `get`/`set` helpers layer JSON on top.
//!
//! ```rust,ignore
//! use syncvote::cache::{create_cache, CacheLayer};
//! use syncvote::config::CacheConfig;
//!
//! let cache = create_cache(&CacheConfig::default()).await?;
//! cache.set_raw("session:abc", "user-1".to_string(), Duration::from_secs(3600)).await?;
//! ```

pub mod memory;
#[cfg(feature = "redis-cache")]
pub mod redis;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{CacheConfig, CacheDriver};

pub use memory::MemoryCache;
#[cfg(feature = "redis-cache")]
pub use redis::RedisCache;

/// Cache layer trait
///
/// The JSON helpers are generic, so this trait is not object safe; share the
/// `Cache` enum instead of `dyn CacheLayer`.
#[async_trait]
pub trait CacheLayer: Send + Sync {
    /// Raw string stored under `key`, if present and not expired
    async fn get_raw(&self, key: &str) -> Result<Option<String>>;

    /// Store a raw string that expires after `ttl`
    async fn set_raw(&self, key: &str, value: String, ttl: Duration) -> Result<()>;

    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>> {
        match self.get_raw(key).await? {
            Some(json) => {
                let value = serde_json::from_str(&json)
                    .with_context(|| format!("Failed to deserialize cached value for {}", key))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: Duration) -> Result<()> {
        let json = serde_json::to_string(value).context("Failed to serialize cache value")?;
        self.set_raw(key, json, ttl).await
    }
}

/// Runtime-selected cache backend
#[derive(Debug)]
pub enum Cache {
    Memory(MemoryCache),
    #[cfg(feature = "redis-cache")]
    Redis(RedisCache),
}

#[async_trait]
impl CacheLayer for Cache {
    async fn get_raw(&self, key: &str) -> Result<Option<String>> {
        match self {
            Cache::Memory(cache) => cache.get_raw(key).await,
            #[cfg(feature = "redis-cache")]
            Cache::Redis(cache) => cache.get_raw(key).await,
        }
    }

    async fn set_raw(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        match self {
            Cache::Memory(cache) => cache.set_raw(key, value, ttl).await,
            #[cfg(feature = "redis-cache")]
            Cache::Redis(cache) => cache.set_raw(key, value, ttl).await,
        }
    }
}

/// Create the cache backend named by the configuration.
///
/// Fails if Redis is selected without a URL, or without the `redis-cache`
/// feature compiled in.
pub async fn create_cache(config: &CacheConfig) -> Result<Arc<Cache>> {
    match config.driver {
        CacheDriver::Memory => {
            let cache = MemoryCache::with_capacity(config.max_capacity);
            Ok(Arc::new(Cache::Memory(cache)))
        }
        CacheDriver::Redis => {
            #[cfg(feature = "redis-cache")]
            {
                let redis_url = config.redis_url.as_ref().ok_or_else(|| {
                    anyhow::anyhow!(
                        "Redis URL is required when using Redis cache driver. \
                         Set 'redis_url' in cache configuration or use SYNCVOTE_CACHE_REDIS_URL environment variable."
                    )
                })?;

                let cache = RedisCache::new(redis_url).await?;
                Ok(Arc::new(Cache::Redis(cache)))
            }

            #[cfg(not(feature = "redis-cache"))]
            {
                anyhow::bail!(
                    "Redis cache driver is configured but the 'redis-cache' feature is not enabled. \
                     Either enable the feature with `--features redis-cache` or use 'memory' cache driver."
                )
            }
        }
    }
}
