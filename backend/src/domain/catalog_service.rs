//! Read-side orchestrator: serves catalogs, lookups, listings, and health.
//!
//! The read path realizes the snapshot state machine. A fingerprint is
//! *absent* when no tier holds it, *building* while the single-flight table
//! has it in flight, *present* once the tiers are populated, and *stale*
//! after a mutator invalidation removes the latest pointer; the next reader
//! moves it back through *building*.

use std::sync::Arc;

use serde::Serialize;
use tracing::warn;

use crate::domain::Error;
use crate::domain::builder::SnapshotBuilder;
use crate::domain::cache::{RequestScope, TieredCache};
use crate::domain::language::{Language, LanguageCode};
use crate::domain::ports::{CacheKey, CatalogStore, CatalogStoreError};
use crate::domain::resolver::{ResolvedValue, Resolver};
use crate::domain::single_flight::SingleFlight;
use crate::domain::snapshot::{CatalogData, CatalogDocument, Fingerprint};

/// Result of a catalog fetch with checksum revalidation.
#[derive(Debug, Clone)]
pub enum CatalogFetch {
    /// The client's checksum matches the served snapshot; send no body.
    NotModified,
    /// The full catalog.
    Full(Arc<CatalogData>),
}

/// Liveness of one dependency, as reported by the health endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentHealth {
    Up,
    Degraded,
    Down,
    Disabled,
}

/// Aggregate health report.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub store: ComponentHealth,
    pub memory_cache: ComponentHealth,
    pub distributed_cache: ComponentHealth,
}

impl HealthReport {
    /// Whether every enabled dependency is fully up.
    pub fn healthy(&self) -> bool {
        self.store == ComponentHealth::Up
            && self.memory_cache == ComponentHealth::Up
            && matches!(
                self.distributed_cache,
                ComponentHealth::Up | ComponentHealth::Disabled
            )
    }
}

/// Outcome of a batch lookup.
#[derive(Debug, Clone)]
pub struct BatchResolution {
    /// Language the batch was requested for.
    pub language: LanguageCode,
    /// Per-key results in request order; `None` marks a missing key.
    pub resolved: Vec<(String, Option<ResolvedValue>)>,
}

/// Read-side orchestrator over store, tiered cache, builder, and
/// single-flight coordination.
pub struct CatalogService {
    store: Arc<dyn CatalogStore>,
    cache: Arc<TieredCache>,
    builder: SnapshotBuilder,
    flights: SingleFlight<Arc<CatalogData>>,
}

impl CatalogService {
    /// Wire the orchestrator.
    pub fn new(store: Arc<dyn CatalogStore>, cache: Arc<TieredCache>) -> Self {
        let builder = SnapshotBuilder::new(Arc::clone(&store));
        Self {
            store,
            cache,
            builder,
            flights: SingleFlight::new(),
        }
    }

    /// Fetch the catalog for a language, honouring checksum revalidation.
    pub async fn get_catalog(
        &self,
        scope: &mut RequestScope,
        language: &LanguageCode,
        category: Option<&str>,
        known_checksum: Option<&str>,
    ) -> Result<CatalogFetch, Error> {
        let data = self.acquire(scope, language, category).await?;
        if known_checksum.is_some_and(|known| known == data.checksum()) {
            return Ok(CatalogFetch::NotModified);
        }
        Ok(CatalogFetch::Full(data))
    }

    /// Resolve one key with optional default-language fallback.
    pub async fn get_key(
        &self,
        scope: &mut RequestScope,
        key: &str,
        language: &LanguageCode,
        fallback: bool,
    ) -> Result<ResolvedValue, Error> {
        let resolver = self.resolver_for(scope, language, fallback).await?;
        resolver
            .resolve(key)
            .ok_or_else(|| Error::not_found(format!("key '{key}' not found")))
    }

    /// Resolve a batch of keys against one snapshot acquisition.
    pub async fn get_batch(
        &self,
        scope: &mut RequestScope,
        keys: &[String],
        language: &LanguageCode,
        fallback: bool,
    ) -> Result<BatchResolution, Error> {
        let resolver = self.resolver_for(scope, language, fallback).await?;
        Ok(BatchResolution {
            language: language.clone(),
            resolved: resolver.resolve_batch(keys),
        })
    }

    /// List languages, served from the short-lived process cache when warm.
    pub async fn list_languages(&self, active_only: bool) -> Result<Vec<Language>, Error> {
        let raw_key = if active_only {
            "languages:active"
        } else {
            "languages:all"
        };
        let key = cache_key(raw_key)?;
        if let Some(json) = self.cache.get_local(&key).await {
            match serde_json::from_str::<Vec<Language>>(&json) {
                Ok(languages) => return Ok(languages),
                Err(err) => {
                    warn!(key = raw_key, error = %err, "cached language list corrupt; refetching");
                }
            }
        }

        let languages = self.store.list_languages(active_only).await?;
        match serde_json::to_string(&languages) {
            Ok(json) => self.cache.put_local(&key, json).await,
            Err(err) => warn!(error = %err, "language list not cacheable"),
        }
        Ok(languages)
    }

    /// Probe the store and report per-tier cache liveness.
    pub async fn health(&self) -> HealthReport {
        let store = match self.store.ping().await {
            Ok(()) => ComponentHealth::Up,
            Err(err) => {
                warn!(error = %err, "store ping failed");
                ComponentHealth::Down
            }
        };
        let distributed_cache = if self.cache.has_distributed() {
            if self.cache.distributed_healthy() {
                ComponentHealth::Up
            } else {
                ComponentHealth::Degraded
            }
        } else {
            ComponentHealth::Disabled
        };
        HealthReport {
            store,
            memory_cache: ComponentHealth::Up,
            distributed_cache,
        }
    }

    /// Builds currently coalesced in the single-flight table.
    pub fn builds_in_flight(&self) -> usize {
        self.flights.in_flight()
    }

    async fn resolver_for(
        &self,
        scope: &mut RequestScope,
        language: &LanguageCode,
        fallback: bool,
    ) -> Result<Resolver, Error> {
        let target = self.acquire(scope, language, None).await?;
        let mut resolver = Resolver::new(target);
        if fallback {
            match self.store.get_default_language().await {
                Ok(default_language) if default_language.code != *language => {
                    let default_data =
                        self.acquire(scope, &default_language.code, None).await?;
                    resolver = resolver.with_fallback(default_data);
                }
                Ok(_) => {}
                // No configured default degrades to lookup without fallback.
                Err(CatalogStoreError::NotFound { .. }) => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(resolver)
    }

    /// Acquire the current catalog for (language, category) through the tier
    /// hierarchy, building at most once per fingerprint under contention.
    async fn acquire(
        &self,
        scope: &mut RequestScope,
        language: &LanguageCode,
        category: Option<&str>,
    ) -> Result<Arc<CatalogData>, Error> {
        let latest_raw = Fingerprint::latest_key(language, category);
        if let Some(data) = scope.get(&latest_raw) {
            return Ok(data);
        }

        if let Some(data) = self.from_tiers(language, category, &latest_raw).await? {
            scope.put(latest_raw, Arc::clone(&data));
            return Ok(data);
        }

        let data = {
            let builder = self.builder.clone();
            let cache = Arc::clone(&self.cache);
            let build_language = language.clone();
            let build_category = category.map(str::to_owned);
            self.flights
                .run(&latest_raw, async move {
                    let data = Arc::new(
                        builder
                            .build(&build_language, build_category.as_deref())
                            .await?,
                    );
                    populate_tiers(&cache, &build_language, build_category.as_deref(), &data)
                        .await;
                    Ok(data)
                })
                .await?
        };
        scope.put(latest_raw, Arc::clone(&data));
        Ok(data)
    }

    /// Try the process and distributed tiers via the latest pointer.
    async fn from_tiers(
        &self,
        language: &LanguageCode,
        category: Option<&str>,
        latest_raw: &str,
    ) -> Result<Option<Arc<CatalogData>>, Error> {
        let latest_key = cache_key(latest_raw)?;
        let Some(raw_version) = self.cache.get_local(&latest_key).await else {
            return Ok(None);
        };
        let Ok(version) = raw_version.parse::<i32>() else {
            warn!(key = latest_raw, value = %raw_version, "latest pointer corrupt; rebuilding");
            return Ok(None);
        };

        let fingerprint = Fingerprint::new(language.clone(), category.map(str::to_owned), version);
        let document_key = cache_key(&fingerprint.cache_key())?;
        let Some((json, _tier)) = self.cache.get_document(&document_key).await else {
            return Ok(None);
        };
        match serde_json::from_str::<CatalogDocument>(&json) {
            Ok(document) => Ok(Some(Arc::new(CatalogData::from_document(document)))),
            Err(err) => {
                warn!(key = %document_key, error = %err, "cached catalog document corrupt; rebuilding");
                Ok(None)
            }
        }
    }
}

/// Write a freshly built catalog into the shared tiers.
///
/// Runs inside the detached single-flight build so population completes even
/// when every waiter has cancelled.
async fn populate_tiers(
    cache: &TieredCache,
    language: &LanguageCode,
    category: Option<&str>,
    data: &Arc<CatalogData>,
) {
    let document_json = match serde_json::to_string(data.document()) {
        Ok(json) => json,
        Err(err) => {
            warn!(error = %err, "catalog document not serializable; tiers not populated");
            return;
        }
    };
    let Ok(document_key) = cache_key(&data.fingerprint().cache_key()) else {
        return;
    };
    cache.put_document(&document_key, document_json).await;

    let Ok(latest_key) = cache_key(&Fingerprint::latest_key(language, category)) else {
        return;
    };
    cache.put_local(&latest_key, data.version().to_string()).await;
}

fn cache_key(raw: &str) -> Result<CacheKey, Error> {
    CacheKey::new(raw).map_err(|err| Error::internal(format!("malformed cache key: {err}")))
}

#[cfg(test)]
mod tests {
    //! Orchestrator behaviour over mocked tiers and store.
    use super::{CatalogFetch, CatalogService, ComponentHealth};
    use crate::domain::cache::{CacheTtls, RequestScope, TieredCache};
    use crate::domain::key::KeyPath;
    use crate::domain::language::{Language, LanguageCode};
    use crate::domain::ports::{
        ApprovedEntry, CatalogStoreError, MockCacheTier, MockCatalogStore,
    };
    use chrono::Utc;
    use rstest::rstest;
    use std::sync::Arc;
    use uuid::Uuid;

    fn language(code: &str, default: bool) -> Language {
        Language {
            id: Uuid::new_v4(),
            code: LanguageCode::new(code).expect("valid code"),
            display_name: code.to_uppercase(),
            native_name: code.to_uppercase(),
            rtl: false,
            active: true,
            default,
            created_at: Utc::now(),
            modified_at: Utc::now(),
            deleted: false,
        }
    }

    fn approved(key: &str, value: &str) -> ApprovedEntry {
        ApprovedEntry {
            key: KeyPath::new(key).expect("valid key"),
            value: value.to_owned(),
            variables: None,
        }
    }

    fn passthrough_memory_tier() -> MockCacheTier {
        let mut memory = MockCacheTier::new();
        memory.expect_get().returning(|_| Ok(None));
        memory.expect_set().returning(|_, _, _| Ok(()));
        memory
    }

    fn service_with(store: MockCatalogStore, memory: MockCacheTier) -> CatalogService {
        let cache = Arc::new(TieredCache::new(
            Arc::new(memory),
            None,
            CacheTtls::default(),
        ));
        CatalogService::new(Arc::new(store), cache)
    }

    fn store_serving(lang: Language, entries: Vec<ApprovedEntry>) -> MockCatalogStore {
        let mut store = MockCatalogStore::new();
        let by_code = lang.clone();
        store
            .expect_get_language_by_code()
            .returning(move |code| {
                if *code == by_code.code {
                    Ok(by_code.clone())
                } else {
                    Err(CatalogStoreError::not_found(format!("language '{code}'")))
                }
            });
        store
            .expect_read_approved_entries()
            .returning(move |_, _| Ok(entries.clone()));
        store
            .expect_latest_catalog_version()
            .returning(|_, _| Ok(0));
        store.expect_write_snapshot().returning(|_| Ok(()));
        store
    }

    #[rstest]
    #[tokio::test]
    async fn checksum_match_returns_not_modified() {
        let lang = language("en", true);
        let code = lang.code.clone();
        let store = store_serving(lang, vec![approved("common.ok", "OK")]);
        let service = service_with(store, passthrough_memory_tier());

        let mut scope = RequestScope::new();
        let fetch = service
            .get_catalog(&mut scope, &code, None, None)
            .await
            .expect("fetch succeeds");
        let CatalogFetch::Full(data) = fetch else {
            panic!("expected full catalog");
        };

        let checksum = data.checksum().to_owned();
        let mut scope = RequestScope::new();
        let revalidated = service
            .get_catalog(&mut scope, &code, None, Some(&checksum))
            .await
            .expect("revalidation succeeds");
        assert!(matches!(revalidated, CatalogFetch::NotModified));

        let mut scope = RequestScope::new();
        let different = service
            .get_catalog(&mut scope, &code, None, Some("0000"))
            .await
            .expect("fetch succeeds");
        assert!(matches!(different, CatalogFetch::Full(_)));
    }

    #[rstest]
    #[tokio::test]
    async fn request_scope_reuses_the_acquired_catalog() {
        let lang = language("en", true);
        let code = lang.code.clone();
        let mut store = MockCatalogStore::new();
        let by_code = lang.clone();
        store
            .expect_get_language_by_code()
            .times(1)
            .returning(move |_| Ok(by_code.clone()));
        store
            .expect_read_approved_entries()
            .times(1)
            .returning(|_, _| Ok(vec![approved("common.ok", "OK")]));
        store
            .expect_latest_catalog_version()
            .returning(|_, _| Ok(0));
        store.expect_write_snapshot().returning(|_| Ok(()));

        let service = service_with(store, passthrough_memory_tier());
        let mut scope = RequestScope::new();
        let first = service
            .get_catalog(&mut scope, &code, None, None)
            .await
            .expect("first fetch");
        let second = service
            .get_catalog(&mut scope, &code, None, None)
            .await
            .expect("second fetch from scope");
        let (CatalogFetch::Full(first), CatalogFetch::Full(second)) = (first, second) else {
            panic!("expected full catalogs");
        };
        assert!(Arc::ptr_eq(&first, &second), "same request-scoped instance");
    }

    #[rstest]
    #[tokio::test]
    async fn fallback_resolves_from_default_language() {
        let target = language("de", false);
        let default = language("en", true);
        let target_code = target.code.clone();

        let mut store = MockCatalogStore::new();
        let languages = vec![target.clone(), default.clone()];
        store.expect_get_language_by_code().returning(move |code| {
            languages
                .iter()
                .find(|lang| lang.code == *code)
                .cloned()
                .ok_or_else(|| CatalogStoreError::not_found(format!("language '{code}'")))
        });
        let default_clone = default.clone();
        store
            .expect_get_default_language()
            .returning(move || Ok(default_clone.clone()));
        let default_id = default.id;
        store
            .expect_read_approved_entries()
            .returning(move |language_id, _| {
                if language_id == default_id {
                    Ok(vec![approved("common.ok", "OK")])
                } else {
                    Ok(Vec::new())
                }
            });
        store
            .expect_latest_catalog_version()
            .returning(|_, _| Ok(0));
        store.expect_write_snapshot().returning(|_| Ok(()));

        let service = service_with(store, passthrough_memory_tier());
        let mut scope = RequestScope::new();
        let resolved = service
            .get_key(&mut scope, "common.ok", &target_code, true)
            .await
            .expect("fallback resolves");
        assert_eq!(resolved.value, "OK");
        assert_eq!(resolved.language.as_str(), "en");

        let mut scope = RequestScope::new();
        let err = service
            .get_key(&mut scope, "common.ok", &target_code, false)
            .await
            .expect_err("no fallback means missing");
        assert_eq!(err.code(), crate::domain::ErrorCode::NotFound);
    }

    #[rstest]
    #[tokio::test]
    async fn language_listing_is_cached_in_the_process_tier() {
        let mut store = MockCatalogStore::new();
        store
            .expect_list_languages()
            .times(1)
            .returning(|_| Ok(vec![language("en", true)]));

        // First read misses, stores; second read hits the cached JSON.
        let cached: Arc<std::sync::Mutex<Option<String>>> =
            Arc::new(std::sync::Mutex::new(None));
        let mut memory = MockCacheTier::new();
        let read_side = Arc::clone(&cached);
        memory
            .expect_get()
            .returning(move |_| Ok(read_side.lock().expect("lock").clone()));
        let write_side = Arc::clone(&cached);
        memory.expect_set().returning(move |_, value, _| {
            *write_side.lock().expect("lock") = Some(value);
            Ok(())
        });

        let service = service_with(store, memory);
        let first = service.list_languages(true).await.expect("first listing");
        let second = service.list_languages(true).await.expect("cached listing");
        assert_eq!(first, second);
    }

    #[rstest]
    #[tokio::test]
    async fn health_reports_store_outage() {
        let mut store = MockCatalogStore::new();
        store
            .expect_ping()
            .returning(|| Err(CatalogStoreError::connection("refused")));
        let service = service_with(store, passthrough_memory_tier());
        let report = service.health().await;
        assert_eq!(report.store, ComponentHealth::Down);
        assert!(!report.healthy());
        assert_eq!(report.distributed_cache, ComponentHealth::Disabled);
    }
}
