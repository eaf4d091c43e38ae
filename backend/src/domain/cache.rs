//! Tier composition policy for the catalog cache.
//!
//! Reads consult request scope, then the process LRU, then the distributed
//! tier; misses populate bottom-up. Immutable fingerprint documents may live
//! in every tier; the mutable "latest" pointer and listing entries stay in
//! the process tier only, with a short TTL, and are actively invalidated on
//! writes. A distributed-tier failure demotes the cache to process-only and
//! is never surfaced to the request.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::domain::ports::{CacheKey, CacheTier, HitTier};
use crate::domain::snapshot::CatalogData;

/// Per-entry time-to-live policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtls {
    /// Immutable catalog documents in the process tier.
    pub catalog: Duration,
    /// "Latest" pointers and listings (process tier only).
    pub latest: Duration,
    /// Immutable catalog documents in the distributed tier.
    pub distributed: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            catalog: Duration::from_secs(60 * 60),
            latest: Duration::from_secs(60),
            distributed: Duration::from_secs(4 * 60 * 60),
        }
    }
}

/// Request-local cache scope, discarded when the response is written.
///
/// Holds decoded catalogs so a batch lookup with fallback decodes the target
/// and default catalogs at most once per request. Never shared across
/// requests.
#[derive(Default)]
pub struct RequestScope {
    catalogs: HashMap<String, Arc<CatalogData>>,
}

impl RequestScope {
    /// Create an empty scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a catalog cached in this request.
    pub fn get(&self, latest_key: &str) -> Option<Arc<CatalogData>> {
        self.catalogs.get(latest_key).cloned()
    }

    /// Record a catalog for the remainder of this request.
    pub fn put(&mut self, latest_key: String, data: Arc<CatalogData>) {
        self.catalogs.insert(latest_key, data);
    }
}

/// Process + distributed tier composition.
pub struct TieredCache {
    memory: Arc<dyn CacheTier>,
    distributed: Option<Arc<dyn CacheTier>>,
    ttls: CacheTtls,
    distributed_healthy: AtomicBool,
}

impl TieredCache {
    /// Compose the process tier with an optional distributed tier.
    pub fn new(
        memory: Arc<dyn CacheTier>,
        distributed: Option<Arc<dyn CacheTier>>,
        ttls: CacheTtls,
    ) -> Self {
        Self {
            memory,
            distributed,
            ttls,
            distributed_healthy: AtomicBool::new(true),
        }
    }

    /// TTL policy in force.
    pub const fn ttls(&self) -> &CacheTtls {
        &self.ttls
    }

    /// Whether a distributed tier is configured at all.
    pub const fn has_distributed(&self) -> bool {
        self.distributed.is_some()
    }

    /// Whether the distributed tier answered its most recent call.
    pub fn distributed_healthy(&self) -> bool {
        self.distributed.is_some() && self.distributed_healthy.load(Ordering::Relaxed)
    }

    /// Fetch an immutable catalog document, consulting tiers in order.
    ///
    /// A distributed hit is copied back into the process tier so the next
    /// read stays local.
    pub async fn get_document(&self, key: &CacheKey) -> Option<(String, HitTier)> {
        match self.memory.get(key).await {
            Ok(Some(value)) => return Some((value, HitTier::Memory)),
            Ok(None) => {}
            Err(err) => warn!(key = %key, error = %err, "process cache read failed"),
        }

        let distributed = self.distributed.as_ref()?;
        match distributed.get(key).await {
            Ok(Some(value)) => {
                self.distributed_healthy.store(true, Ordering::Relaxed);
                if let Err(err) = self
                    .memory
                    .set(key, value.clone(), self.ttls.catalog)
                    .await
                {
                    warn!(key = %key, error = %err, "process cache backfill failed");
                }
                Some((value, HitTier::Distributed))
            }
            Ok(None) => {
                self.distributed_healthy.store(true, Ordering::Relaxed);
                None
            }
            Err(err) => {
                self.distributed_healthy.store(false, Ordering::Relaxed);
                warn!(key = %key, error = %err, "distributed cache read failed; serving without it");
                None
            }
        }
    }

    /// Store an immutable catalog document in every tier.
    pub async fn put_document(&self, key: &CacheKey, value: String) {
        if let Err(err) = self
            .memory
            .set(key, value.clone(), self.ttls.catalog)
            .await
        {
            warn!(key = %key, error = %err, "process cache write failed");
        }
        if let Some(distributed) = self.distributed.as_ref() {
            // Jitter distributed expiry so fleet-wide entries for the same
            // fingerprint do not all lapse in the same second.
            let ttl = jittered(self.ttls.distributed);
            match distributed.set(key, value, ttl).await {
                Ok(()) => self.distributed_healthy.store(true, Ordering::Relaxed),
                Err(err) => {
                    self.distributed_healthy.store(false, Ordering::Relaxed);
                    warn!(key = %key, error = %err, "distributed cache write failed; demoted to process tier");
                }
            }
        }
    }

    /// Read a process-tier-only entry (latest pointer or listing).
    pub async fn get_local(&self, key: &CacheKey) -> Option<String> {
        match self.memory.get(key).await {
            Ok(value) => value,
            Err(err) => {
                warn!(key = %key, error = %err, "process cache read failed");
                None
            }
        }
    }

    /// Store a process-tier-only entry with the short pointer TTL.
    pub async fn put_local(&self, key: &CacheKey, value: String) {
        if let Err(err) = self.memory.set(key, value, self.ttls.latest).await {
            warn!(key = %key, error = %err, "process cache write failed");
        }
    }

    /// Apply invalidation patterns to the process tier, then the distributed
    /// tier. Returns the patterns the distributed tier failed to apply so the
    /// caller can queue them for retry.
    pub async fn invalidate(&self, patterns: &[String]) -> Vec<String> {
        for pattern in patterns {
            if let Err(err) = self.memory.delete_pattern(pattern).await {
                warn!(pattern = %pattern, error = %err, "process cache invalidation failed");
            }
        }

        let Some(distributed) = self.distributed.as_ref() else {
            return Vec::new();
        };
        let mut failed = Vec::new();
        for pattern in patterns {
            match distributed.delete_pattern(pattern).await {
                Ok(_) => self.distributed_healthy.store(true, Ordering::Relaxed),
                Err(err) => {
                    self.distributed_healthy.store(false, Ordering::Relaxed);
                    warn!(
                        pattern = %pattern,
                        error = %err,
                        "distributed cache invalidation failed; queueing for retry"
                    );
                    failed.push(pattern.clone());
                }
            }
        }
        failed
    }

    /// Apply one pattern to the distributed tier only (retry path).
    pub async fn invalidate_distributed(&self, pattern: &str) -> Result<(), ()> {
        let Some(distributed) = self.distributed.as_ref() else {
            return Ok(());
        };
        match distributed.delete_pattern(pattern).await {
            Ok(_) => {
                self.distributed_healthy.store(true, Ordering::Relaxed);
                Ok(())
            }
            Err(err) => {
                self.distributed_healthy.store(false, Ordering::Relaxed);
                warn!(pattern = %pattern, error = %err, "distributed cache invalidation retry failed");
                Err(())
            }
        }
    }
}

fn jittered(ttl: Duration) -> Duration {
    let spread = ttl.as_secs() / 10;
    if spread == 0 {
        return ttl;
    }
    let offset = rand::thread_rng().gen_range(0..=spread);
    ttl + Duration::from_secs(offset)
}

/// Match a key against a glob pattern with `*` wildcards at any position.
///
/// `*` matches any run of characters, including `:` separators and none at
/// all. Literal `*` characters inside keys (the "no category" segment) are
/// matched by a `*` wildcard like any other character.
pub fn glob_match(pattern: &str, key: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let key: Vec<char> = key.chars().collect();

    // Iterative wildcard matching with backtracking over the last star. The
    // wildcard check runs before the literal comparison so a `*` wildcard in
    // the pattern is never consumed as a literal against a `*` in the key.
    let (mut p, mut k) = (0usize, 0usize);
    let (mut star, mut star_k) = (None::<usize>, 0usize);
    while k < key.len() {
        if pattern.get(p) == Some(&'*') {
            star = Some(p);
            star_k = k;
            p += 1;
        } else if p < pattern.len() && pattern.get(p) == key.get(k) {
            p += 1;
            k += 1;
        } else if let Some(last_star) = star {
            p = last_star + 1;
            star_k += 1;
            k = star_k;
        } else {
            return false;
        }
    }
    while pattern.get(p) == Some(&'*') {
        p += 1;
    }
    p == pattern.len()
}
