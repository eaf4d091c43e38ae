//! Cache tier adapters: process-local LRU and redis-backed distributed.

mod memory;
mod redis;

pub use memory::{MemoryCache, MemoryCacheConfig};
pub use redis::RedisCatalogCache;
