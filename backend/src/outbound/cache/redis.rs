//! Distributed cache tier backed by redis via `bb8-redis`.
//!
//! Values are opaque JSON strings set with an expiry; pattern invalidation
//! walks the keyspace with cursored `SCAN`/`DEL` batches so it never blocks
//! the server the way `KEYS` would.

use std::time::Duration;

use async_trait::async_trait;
use bb8_redis::RedisConnectionManager;
use bb8_redis::bb8::Pool;
use bb8_redis::redis;

use crate::domain::ports::{CacheKey, CacheTier, CatalogCacheError};

/// How many keys one SCAN batch requests.
const SCAN_BATCH: usize = 200;

/// Redis-backed distributed cache tier.
#[derive(Clone)]
pub struct RedisCatalogCache {
    pool: Pool<RedisConnectionManager>,
}

impl RedisCatalogCache {
    /// Connect a pooled client to the given redis URL.
    ///
    /// # Errors
    ///
    /// Returns a backend error when the URL is malformed or the pool cannot
    /// be built.
    pub async fn connect(url: &str, pool_size: u32) -> Result<Self, CatalogCacheError> {
        let manager = RedisConnectionManager::new(url)
            .map_err(|err| CatalogCacheError::backend(err.to_string()))?;
        let pool = Pool::builder()
            .max_size(pool_size.max(1))
            .build(manager)
            .await
            .map_err(|err| CatalogCacheError::backend(err.to_string()))?;
        Ok(Self { pool })
    }

    /// Round-trip a PING to verify the connection.
    pub async fn ping(&self) -> Result<(), CatalogCacheError> {
        let mut conn = self.conn().await?;
        redis::cmd("PING")
            .query_async::<()>(&mut *conn)
            .await
            .map_err(|err| CatalogCacheError::backend(err.to_string()))
    }

    async fn conn(
        &self,
    ) -> Result<
        bb8_redis::bb8::PooledConnection<'_, RedisConnectionManager>,
        CatalogCacheError,
    > {
        self.pool
            .get()
            .await
            .map_err(|err| CatalogCacheError::backend(err.to_string()))
    }
}

#[async_trait]
impl CacheTier for RedisCatalogCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<String>, CatalogCacheError> {
        let mut conn = self.conn().await?;
        redis::cmd("GET")
            .arg(key.as_str())
            .query_async(&mut *conn)
            .await
            .map_err(|err| CatalogCacheError::backend(err.to_string()))
    }

    async fn set(
        &self,
        key: &CacheKey,
        value: String,
        ttl: Duration,
    ) -> Result<(), CatalogCacheError> {
        let mut conn = self.conn().await?;
        redis::cmd("SET")
            .arg(key.as_str())
            .arg(value)
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async::<()>(&mut *conn)
            .await
            .map_err(|err| CatalogCacheError::backend(err.to_string()))
    }

    async fn delete(&self, key: &CacheKey) -> Result<(), CatalogCacheError> {
        let mut conn = self.conn().await?;
        redis::cmd("DEL")
            .arg(key.as_str())
            .query_async::<()>(&mut *conn)
            .await
            .map_err(|err| CatalogCacheError::backend(err.to_string()))
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<u64, CatalogCacheError> {
        let mut conn = self.conn().await?;
        let mut cursor: u64 = 0;
        let mut removed: u64 = 0;
        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut *conn)
                .await
                .map_err(|err| CatalogCacheError::backend(err.to_string()))?;
            if !keys.is_empty() {
                let deleted: u64 = redis::cmd("DEL")
                    .arg(&keys)
                    .query_async(&mut *conn)
                    .await
                    .map_err(|err| CatalogCacheError::backend(err.to_string()))?;
                removed += deleted;
            }
            cursor = next;
            if cursor == 0 {
                break;
            }
        }
        Ok(removed)
    }
}
