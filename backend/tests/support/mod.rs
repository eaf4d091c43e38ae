//! Shared fixtures for integration tests: an in-memory store wired to a
//! real process-tier cache behind the tiered composition.
#![allow(dead_code, reason = "each test binary uses a different helper subset")]

use std::sync::Arc;
use std::time::Duration;

use lexicon_backend::domain::audit::AuditContext;
use lexicon_backend::domain::ports::{CacheTier, CatalogStore};
use lexicon_backend::domain::{
    AdminService, CacheTtls, CatalogService, KeyPath, LanguageCode, LanguageDraft, Localization,
    LocalizationUpsert, TieredCache,
};
use lexicon_backend::outbound::cache::{MemoryCache, MemoryCacheConfig};
use lexicon_backend::test_support::InMemoryCatalogStore;

/// Everything a test needs to drive the engine end to end.
pub struct Harness {
    pub store: Arc<InMemoryCatalogStore>,
    pub memory: Arc<MemoryCache>,
    pub cache: Arc<TieredCache>,
    pub catalog: Arc<CatalogService>,
    pub admin: Arc<AdminService>,
}

/// Build a harness with the process tier only.
pub fn harness() -> Harness {
    harness_with_distributed(None)
}

/// Build a harness with an optional distributed tier.
pub fn harness_with_distributed(distributed: Option<Arc<dyn CacheTier>>) -> Harness {
    let store = Arc::new(InMemoryCatalogStore::new());
    let memory = Arc::new(MemoryCache::new(MemoryCacheConfig {
        capacity_bytes: 16 * 1024 * 1024,
        shards: 4,
    }));
    let ttls = CacheTtls {
        catalog: Duration::from_secs(3600),
        latest: Duration::from_secs(60),
        distributed: Duration::from_secs(4 * 3600),
    };
    let cache = Arc::new(TieredCache::new(
        Arc::clone(&memory) as Arc<dyn CacheTier>,
        distributed,
        ttls,
    ));
    let catalog = Arc::new(CatalogService::new(
        Arc::clone(&store) as Arc<dyn CatalogStore>,
        Arc::clone(&cache),
    ));
    let admin = Arc::new(AdminService::new(
        Arc::clone(&store) as Arc<dyn CatalogStore>,
        Arc::clone(&cache),
    ));
    Harness {
        store,
        memory,
        cache,
        catalog,
        admin,
    }
}

/// Audit context used by seeding helpers.
pub fn admin_ctx() -> AuditContext {
    AuditContext::new("ops@example.com")
        .origin("203.0.113.9")
        .user_agent("lexicon-tests/1.0")
}

/// Create a language through the admin surface.
pub async fn seed_language(harness: &Harness, code: &str, name: &str, default: bool) {
    let code = LanguageCode::new(code).expect("valid code");
    let draft = LanguageDraft::new(code, name, name)
        .expect("valid draft")
        .default_language(default);
    harness
        .admin
        .create_language(draft, admin_ctx())
        .await
        .expect("language created");
}

/// Upsert an approved localization through the admin surface.
pub async fn seed_localization(
    harness: &Harness,
    key: &str,
    language: &str,
    value: &str,
) -> Localization {
    upsert_localization(harness, key, language, value, true).await
}

/// Upsert a localization with explicit approval.
pub async fn upsert_localization(
    harness: &Harness,
    key: &str,
    language: &str,
    value: &str,
    approved: bool,
) -> Localization {
    let key = KeyPath::new(key).expect("valid key");
    let language = LanguageCode::new(language).expect("valid code");
    let upsert = LocalizationUpsert::new(key, language, value)
        .expect("valid upsert")
        .approved(approved);
    harness
        .admin
        .upsert_localization(upsert, admin_ctx())
        .await
        .expect("localization upserted")
}

/// Parse a language code fixture.
pub fn lang(code: &str) -> LanguageCode {
    LanguageCode::new(code).expect("valid code")
}
