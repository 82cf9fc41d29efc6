//! Redis cache implementation
//!
//! Shared cache for deployments running several instances. Expiry is
//! delegated to Redis via SETEX.

use super::CacheLayer;
use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use std::time::Duration;

/// Redis-backed cache
pub struct RedisCache {
    connection: MultiplexedConnection,
}

impl std::fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCache").finish_non_exhaustive()
    }
}

impl RedisCache {
    /// Connect to Redis at `redis_url` (e.g. `redis://localhost:6379`)
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url).context("Failed to create Redis client")?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .context("Failed to connect to Redis")?;

        tracing::info!("Connected to Redis cache");
        Ok(Self { connection })
    }
}

#[async_trait]
impl CacheLayer for RedisCache {
    async fn get_raw(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.connection.clone();
        let value: Option<String> = conn
            .get(key)
            .await
            .context("Failed to get value from Redis")?;
        Ok(value)
    }

    async fn set_raw(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        let mut conn = self.connection.clone();
        // SETEX takes whole seconds
        let ttl_secs = ttl.as_secs().max(1);

        let _: () = conn
            .set_ex(key, value, ttl_secs)
            .await
            .context("Failed to set value in Redis")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn redis_url() -> String {
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string())
    }

    #[tokio::test]
    #[ignore = "requires running Redis server"]
    async fn test_set_and_get() {
        let cache = RedisCache::new(&redis_url()).await.unwrap();

        cache
            .set_raw("syncvote:test:key", "value".to_string(), Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(
            cache.get_raw("syncvote:test:key").await.unwrap(),
            Some("value".to_string())
        );
    }

    #[tokio::test]
    #[ignore = "requires running Redis server"]
    async fn test_entry_expires() {
        let cache = RedisCache::new(&redis_url()).await.unwrap();

        cache
            .set_raw("syncvote:test:ttl", "value".to_string(), Duration::from_secs(1))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(cache.get_raw("syncvote:test:ttl").await.unwrap(), None);
    }
}
