//! Port interface for catalog cache tiers.
//!
//! Tiers store opaque JSON strings under validated keys. The process-local
//! LRU and the redis-backed distributed tier both implement this trait; the
//! tiered composition in `domain::cache` consults them in order.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use super::define_port_error;

define_port_error! {
    /// Errors surfaced by cache tier adapters.
    pub enum CatalogCacheError {
        /// Tier backend is unavailable or timing out.
        Backend { message: String } => "cache backend failure: {message}",
        /// Serialisation or deserialisation of cached content failed.
        Serialization { message: String } => "cache serialisation failed: {message}",
    }
}

/// Cache key used to store catalog documents and pointers.
///
/// Shapes in use: `catalog:<lang>:<category-or-*>:<version>` for immutable
/// documents, `catalog:<lang>:<category-or-*>` for latest pointers, and
/// `languages:<all|active>` for language lists.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Construct a cache key after validating that it is non-empty and
    /// contains no whitespace.
    pub fn new(value: impl Into<String>) -> Result<Self, CacheKeyValidationError> {
        let raw = value.into();
        if raw.is_empty() {
            return Err(CacheKeyValidationError::Empty);
        }
        if raw.chars().any(char::is_whitespace) {
            return Err(CacheKeyValidationError::ContainsWhitespace);
        }
        Ok(Self(raw))
    }

    /// Borrow the underlying key as a string slice.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// Validation errors returned when constructing [`CacheKey`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheKeyValidationError {
    /// Key is empty.
    #[error("cache key must not be empty")]
    Empty,
    /// Key contains whitespace.
    #[error("cache key must not contain whitespace")]
    ContainsWhitespace,
}

/// One cache tier: get/set/delete plus glob pattern invalidation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CacheTier: Send + Sync {
    /// Read a cached value.
    async fn get(&self, key: &CacheKey) -> Result<Option<String>, CatalogCacheError>;

    /// Store a value with a time-to-live.
    async fn set(
        &self,
        key: &CacheKey,
        value: String,
        ttl: Duration,
    ) -> Result<(), CatalogCacheError>;

    /// Remove one key.
    async fn delete(&self, key: &CacheKey) -> Result<(), CatalogCacheError>;

    /// Remove every key matching a glob pattern (`*` wildcards at any
    /// position). Returns the number of keys removed.
    async fn delete_pattern(&self, pattern: &str) -> Result<u64, CatalogCacheError>;
}

/// Which tier satisfied a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitTier {
    /// Request-local scope.
    Request,
    /// Process-local LRU.
    Memory,
    /// Fleet-wide distributed tier.
    Distributed,
}

#[cfg(test)]
mod tests {
    //! Validates cache key construction.
    use super::{CacheKey, CacheKeyValidationError};
    use rstest::rstest;

    #[rstest]
    fn cache_key_rejects_empty() {
        let err = CacheKey::new("").expect_err("empty rejected");
        assert_eq!(err, CacheKeyValidationError::Empty);
    }

    #[rstest]
    #[case("catalog: en")]
    #[case("catalog:en\t")]
    fn cache_key_rejects_whitespace(#[case] value: &str) {
        let err = CacheKey::new(value).expect_err("whitespace rejected");
        assert_eq!(err, CacheKeyValidationError::ContainsWhitespace);
    }

    #[rstest]
    fn cache_key_accepts_catalog_shapes() {
        let key = CacheKey::new("catalog:en:*:3").expect("valid key");
        assert_eq!(key.as_str(), "catalog:en:*:3");
        assert_eq!(key.to_string(), "catalog:en:*:3");
    }
}
