//! Process-local cache tier: byte-bounded LRU with per-entry TTL.
//!
//! Keys hash onto a fixed set of shards, each guarded by its own mutex, so
//! hot reads do not serialize across the process. Within a shard, recency is
//! an intrusive doubly-linked list over a slab, giving O(1) get/set/evict.
//! Eviction is by bytes consumed; a background sweeper drops expired entries
//! so idle catalogs do not pin memory until their next read.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::domain::cache::glob_match;
use crate::domain::ports::{CacheKey, CacheTier, CatalogCacheError};

/// Sentinel index marking list ends.
const NIL: usize = usize::MAX;

/// Fixed per-entry overhead charged on top of key and value bytes.
const ENTRY_OVERHEAD: usize = 64;

/// Configuration for the process tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryCacheConfig {
    /// Total byte budget across all shards.
    pub capacity_bytes: usize,
    /// Number of independently locked shards.
    pub shards: usize,
}

impl Default for MemoryCacheConfig {
    fn default() -> Self {
        Self {
            capacity_bytes: 1024 * 1024 * 1024,
            shards: 16,
        }
    }
}

struct Node {
    key: String,
    prev: usize,
    next: usize,
}

struct Slot {
    value: String,
    node: usize,
    expires_at: Instant,
    charge: usize,
}

/// One shard: key map plus intrusive recency list over a slab.
struct Shard {
    map: HashMap<String, Slot>,
    nodes: Vec<Node>,
    free: Vec<usize>,
    head: usize,
    tail: usize,
    bytes: usize,
    capacity: usize,
}

impl Shard {
    fn new(capacity: usize) -> Self {
        Self {
            map: HashMap::new(),
            nodes: Vec::new(),
            free: Vec::new(),
            head: NIL,
            tail: NIL,
            bytes: 0,
            capacity,
        }
    }

    fn detach(&mut self, index: usize) {
        let (prev, next) = {
            let node = &self.nodes[index];
            (node.prev, node.next)
        };
        if prev == NIL {
            self.head = next;
        } else {
            self.nodes[prev].next = next;
        }
        if next == NIL {
            self.tail = prev;
        } else {
            self.nodes[next].prev = prev;
        }
    }

    fn push_front(&mut self, index: usize) {
        self.nodes[index].prev = NIL;
        self.nodes[index].next = self.head;
        if self.head != NIL {
            self.nodes[self.head].prev = index;
        }
        self.head = index;
        if self.tail == NIL {
            self.tail = index;
        }
    }

    fn allocate(&mut self, key: String) -> usize {
        if let Some(index) = self.free.pop() {
            self.nodes[index] = Node {
                key,
                prev: NIL,
                next: NIL,
            };
            index
        } else {
            self.nodes.push(Node {
                key,
                prev: NIL,
                next: NIL,
            });
            self.nodes.len() - 1
        }
    }

    fn remove(&mut self, key: &str) -> bool {
        let Some(slot) = self.map.remove(key) else {
            return false;
        };
        self.detach(slot.node);
        self.free.push(slot.node);
        self.bytes -= slot.charge;
        true
    }

    fn get(&mut self, key: &str, now: Instant) -> Option<String> {
        let slot = self.map.get(key)?;
        if slot.expires_at <= now {
            self.remove(key);
            return None;
        }
        let node = slot.node;
        let value = slot.value.clone();
        self.detach(node);
        self.push_front(node);
        Some(value)
    }

    fn set(&mut self, key: &str, value: String, ttl: Duration, now: Instant) {
        self.remove(key);
        let charge = key.len() + value.len() + ENTRY_OVERHEAD;
        let node = self.allocate(key.to_owned());
        self.push_front(node);
        self.map.insert(key.to_owned(), Slot {
            value,
            node,
            expires_at: now + ttl,
            charge,
        });
        self.bytes += charge;
        self.evict_over_capacity();
    }

    fn evict_over_capacity(&mut self) {
        while self.bytes > self.capacity && self.tail != NIL {
            let key = self.nodes[self.tail].key.clone();
            self.remove(&key);
        }
    }

    fn delete_pattern(&mut self, pattern: &str) -> u64 {
        let matching: Vec<String> = self
            .map
            .keys()
            .filter(|key| glob_match(pattern, key))
            .cloned()
            .collect();
        let removed = matching.len() as u64;
        for key in matching {
            self.remove(&key);
        }
        removed
    }

    fn sweep(&mut self, now: Instant) -> u64 {
        let expired: Vec<String> = self
            .map
            .iter()
            .filter(|(_, slot)| slot.expires_at <= now)
            .map(|(key, _)| key.clone())
            .collect();
        let removed = expired.len() as u64;
        for key in expired {
            self.remove(&key);
        }
        removed
    }
}

/// Process-local LRU cache tier.
pub struct MemoryCache {
    shards: Vec<Mutex<Shard>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoryCache {
    /// Create a cache with the given configuration.
    pub fn new(config: MemoryCacheConfig) -> Self {
        let shard_count = config.shards.max(1);
        let per_shard = (config.capacity_bytes / shard_count).max(ENTRY_OVERHEAD);
        let shards = (0..shard_count)
            .map(|_| Mutex::new(Shard::new(per_shard)))
            .collect();
        Self {
            shards,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn shard_for(&self, key: &str) -> &Mutex<Shard> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let index = (hasher.finish() as usize) % self.shards.len();
        &self.shards[index]
    }

    /// Entries currently held across all shards.
    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| lock(shard).map.len())
            .sum()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes currently charged across all shards.
    pub fn bytes(&self) -> usize {
        self.shards.iter().map(|shard| lock(shard).bytes).sum()
    }

    /// Hit/miss counters since startup.
    pub fn hit_miss(&self) -> (u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }

    /// Drop expired entries in every shard; returns how many were removed.
    pub fn sweep_expired(&self) -> u64 {
        let now = Instant::now();
        self.shards
            .iter()
            .map(|shard| lock(shard).sweep(now))
            .sum()
    }

    /// Spawn the periodic sweeper task.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let removed = cache.sweep_expired();
                if removed > 0 {
                    debug!(removed, "memory cache sweeper dropped expired entries");
                }
            }
        })
    }
}

fn lock(shard: &Mutex<Shard>) -> std::sync::MutexGuard<'_, Shard> {
    shard.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl CacheTier for MemoryCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<String>, CatalogCacheError> {
        let value = lock(self.shard_for(key.as_str())).get(key.as_str(), Instant::now());
        if value.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        Ok(value)
    }

    async fn set(
        &self,
        key: &CacheKey,
        value: String,
        ttl: Duration,
    ) -> Result<(), CatalogCacheError> {
        lock(self.shard_for(key.as_str())).set(key.as_str(), value, ttl, Instant::now());
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> Result<(), CatalogCacheError> {
        lock(self.shard_for(key.as_str())).remove(key.as_str());
        Ok(())
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<u64, CatalogCacheError> {
        Ok(self
            .shards
            .iter()
            .map(|shard| lock(shard).delete_pattern(pattern))
            .sum())
    }
}

#[cfg(test)]
mod tests {
    //! LRU eviction, TTL expiry, pattern deletion, and sweeper behaviour.
    use super::{ENTRY_OVERHEAD, MemoryCache, MemoryCacheConfig};
    use crate::domain::ports::{CacheKey, CacheTier};
    use rstest::rstest;
    use std::time::Duration;

    fn key(raw: &str) -> CacheKey {
        CacheKey::new(raw).expect("valid key")
    }

    fn single_shard(capacity_bytes: usize) -> MemoryCache {
        MemoryCache::new(MemoryCacheConfig {
            capacity_bytes,
            shards: 1,
        })
    }

    const HOUR: Duration = Duration::from_secs(3600);

    #[tokio::test]
    async fn round_trips_values() {
        let cache = single_shard(4096);
        cache
            .set(&key("catalog:en:*:1"), "doc".to_owned(), HOUR)
            .await
            .expect("set succeeds");
        let value = cache.get(&key("catalog:en:*:1")).await.expect("get succeeds");
        assert_eq!(value.as_deref(), Some("doc"));
        assert_eq!(cache.hit_miss().0, 1);
    }

    #[tokio::test]
    async fn evicts_least_recently_used_when_over_byte_budget() {
        // Budget fits two entries; touching `a` makes `b` the eviction victim.
        let entry_bytes = "k:a".len() + "v".len() + ENTRY_OVERHEAD;
        let cache = single_shard(entry_bytes * 2);
        cache.set(&key("k:a"), "v".to_owned(), HOUR).await.expect("set a");
        cache.set(&key("k:b"), "v".to_owned(), HOUR).await.expect("set b");
        let _ = cache.get(&key("k:a")).await.expect("touch a");
        cache.set(&key("k:c"), "v".to_owned(), HOUR).await.expect("set c");

        assert!(cache.get(&key("k:a")).await.expect("get a").is_some());
        assert!(cache.get(&key("k:b")).await.expect("get b").is_none());
        assert!(cache.get(&key("k:c")).await.expect("get c").is_some());
    }

    #[tokio::test]
    async fn expired_entries_miss_on_read() {
        let cache = single_shard(4096);
        cache
            .set(&key("catalog:en:*"), "3".to_owned(), Duration::ZERO)
            .await
            .expect("set succeeds");
        assert!(cache.get(&key("catalog:en:*")).await.expect("get").is_none());
        assert!(cache.is_empty(), "expired entry dropped on read");
    }

    #[tokio::test]
    async fn delete_pattern_scans_all_shards() {
        let cache = MemoryCache::new(MemoryCacheConfig {
            capacity_bytes: 1024 * 1024,
            shards: 8,
        });
        for raw in ["catalog:en:*", "catalog:en:*:1", "catalog:de:*", "languages:all"] {
            cache
                .set(&key(raw), "x".to_owned(), HOUR)
                .await
                .expect("set succeeds");
        }

        let removed = cache.delete_pattern("catalog:en:*").await.expect("delete");
        assert_eq!(removed, 2);
        assert!(cache.get(&key("catalog:de:*")).await.expect("get").is_some());
        assert!(cache.get(&key("languages:all")).await.expect("get").is_some());
    }

    #[tokio::test]
    async fn sweeper_drops_expired_entries() {
        let cache = single_shard(4096);
        cache
            .set(&key("k:stale"), "x".to_owned(), Duration::ZERO)
            .await
            .expect("set stale");
        cache
            .set(&key("k:fresh"), "x".to_owned(), HOUR)
            .await
            .expect("set fresh");

        assert_eq!(cache.sweep_expired(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[rstest]
    fn byte_accounting_shrinks_on_removal() {
        let cache = single_shard(4096);
        futures::executor::block_on(async {
            cache
                .set(&key("k:a"), "value".to_owned(), HOUR)
                .await
                .expect("set succeeds");
            let before = cache.bytes();
            assert!(before > 0);
            cache.delete(&key("k:a")).await.expect("delete succeeds");
            assert_eq!(cache.bytes(), 0);
        });
    }

    #[tokio::test]
    async fn overwrite_replaces_charge_instead_of_accumulating() {
        let cache = single_shard(4096);
        cache
            .set(&key("k:a"), "first".to_owned(), HOUR)
            .await
            .expect("set first");
        let first = cache.bytes();
        cache
            .set(&key("k:a"), "second-longer-value".to_owned(), HOUR)
            .await
            .expect("set second");
        assert_eq!(cache.len(), 1);
        assert!(cache.bytes() > first);
        cache.delete(&key("k:a")).await.expect("delete");
        assert_eq!(cache.bytes(), 0);
    }
}
