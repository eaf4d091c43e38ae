//! Write-side orchestrator: validated mutations, cascading cache
//! invalidation, and the audit trail.
//!
//! Every mutation commits entity change and audit record in one store
//! transaction, then invalidates the affected cache patterns: process tier
//! first, distributed tier second. A distributed invalidation failure is
//! queued for retry and the admin still sees success: the write is
//! authoritative; remote process caches may serve older data up to their TTL
//! until the retry lands.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::domain::Error;
use crate::domain::audit::{
    AuditAction, AuditContext, AuditEntityKind, AuditFilter, AuditRecord,
};
use crate::domain::cache::TieredCache;
use crate::domain::key::{KeyDraft, KeyPath, KeyUpdate, LocalizationKey};
use crate::domain::language::{Language, LanguageCode, LanguageDraft, LanguageUpdate};
use crate::domain::localization::{Localization, LocalizationUpsert};
use crate::domain::ports::{CatalogStore, InvalidationOutcome};

/// Pattern wiping every catalog entry. The wildcard crosses `:` separators,
/// so this covers latest pointers and versioned documents for every
/// (language, category) pair.
const ALL_CATALOGS: &str = "catalog:*:*";
/// Pattern wiping cached language listings.
const ALL_LISTINGS: &str = "languages:*";

/// Write-side orchestrator.
pub struct AdminService {
    store: Arc<dyn CatalogStore>,
    cache: Arc<TieredCache>,
}

impl AdminService {
    /// Wire the mutator.
    pub const fn new(store: Arc<dyn CatalogStore>, cache: Arc<TieredCache>) -> Self {
        Self { store, cache }
    }

    // -- languages ----------------------------------------------------------

    /// Create a language.
    pub async fn create_language(
        &self,
        draft: LanguageDraft,
        ctx: AuditContext,
    ) -> Result<Language, Error> {
        let language = self.store.create_language(draft, ctx).await?;
        self.invalidate(language_patterns(&language, language.default))
            .await;
        Ok(language)
    }

    /// Update a language addressed by code.
    pub async fn update_language(
        &self,
        code: &LanguageCode,
        update: LanguageUpdate,
        ctx: AuditContext,
    ) -> Result<Language, Error> {
        if update.is_empty() {
            return Err(Error::validation("language update changes nothing"));
        }
        let existing = self.store.get_language_by_code(code).await?;
        // Touching the default flag re-targets fallback resolution for every
        // catalog, so the blast radius is global.
        let default_changed = update
            .default
            .is_some_and(|default| default != existing.default);
        let language = self
            .store
            .update_language(existing.id, update, ctx)
            .await?;
        self.invalidate(language_patterns(&language, default_changed))
            .await;
        Ok(language)
    }

    /// Soft-delete a language addressed by code.
    pub async fn delete_language(
        &self,
        code: &LanguageCode,
        ctx: AuditContext,
    ) -> Result<Language, Error> {
        let existing = self.store.get_language_by_code(code).await?;
        let language = self.store.soft_delete_language(existing.id, ctx).await?;
        self.invalidate(language_patterns(&language, language.default))
            .await;
        Ok(language)
    }

    // -- keys ---------------------------------------------------------------

    /// Register a localization key.
    pub async fn create_key(
        &self,
        draft: KeyDraft,
        ctx: AuditContext,
    ) -> Result<LocalizationKey, Error> {
        let category = draft.category.clone();
        let key = self.store.create_key(draft, ctx).await?;
        self.invalidate(key_patterns(category.as_deref(), None))
            .await;
        Ok(key)
    }

    /// Update a key addressed by path.
    pub async fn update_key(
        &self,
        path: &KeyPath,
        update: KeyUpdate,
        ctx: AuditContext,
    ) -> Result<LocalizationKey, Error> {
        if update.is_empty() {
            return Err(Error::validation("key update changes nothing"));
        }
        let existing = self.store.get_key_by_value(path).await?;
        let old_category = existing.category.clone();
        let key = self.store.update_key(existing.id, update, ctx).await?;
        self.invalidate(key_patterns(
            old_category.as_deref(),
            Some(key.category.as_deref()),
        ))
        .await;
        Ok(key)
    }

    /// List non-deleted keys in a category.
    pub async fn list_keys(&self, category: &str) -> Result<Vec<LocalizationKey>, Error> {
        Ok(self.store.list_keys_by_category(category).await?)
    }

    /// Soft-delete a key addressed by path.
    pub async fn delete_key(
        &self,
        path: &KeyPath,
        ctx: AuditContext,
    ) -> Result<LocalizationKey, Error> {
        let existing = self.store.get_key_by_value(path).await?;
        let key = self.store.soft_delete_key(existing.id, ctx).await?;
        // Deletion removes the key from unfiltered catalogs of every
        // language, not just its own category's views.
        self.invalidate(vec![ALL_CATALOGS.to_owned()]).await;
        Ok(key)
    }

    // -- localizations ------------------------------------------------------

    /// Insert or update a localization, registering its key when absent.
    pub async fn upsert_localization(
        &self,
        upsert: LocalizationUpsert,
        ctx: AuditContext,
    ) -> Result<Localization, Error> {
        let language = upsert.language.clone();
        let category = upsert.category.clone();
        let localization = self.store.upsert_localization(upsert, ctx).await?;
        self.invalidate(localization_patterns(&language, category.as_deref()))
            .await;
        Ok(localization)
    }

    /// Approve a localization by id; idempotent.
    pub async fn approve_localization(
        &self,
        id: Uuid,
        ctx: AuditContext,
    ) -> Result<Localization, Error> {
        let localization = self.store.approve_localization(id, ctx).await?;
        let language = self
            .store
            .get_language_by_id(localization.language_id)
            .await?;
        self.invalidate(localization_patterns(&language.code, None))
            .await;
        Ok(localization)
    }

    /// Soft-delete a localization by id.
    pub async fn delete_localization(
        &self,
        id: Uuid,
        ctx: AuditContext,
    ) -> Result<Localization, Error> {
        let localization = self.store.soft_delete_localization(id, ctx).await?;
        let language = self
            .store
            .get_language_by_id(localization.language_id)
            .await?;
        self.invalidate(localization_patterns(&language.code, None))
            .await;
        Ok(localization)
    }

    // -- cache --------------------------------------------------------------

    /// Explicit cache invalidation, audited as a cache action.
    ///
    /// Returns the patterns that were applied.
    pub async fn invalidate_cache(
        &self,
        language: Option<&LanguageCode>,
        category: Option<&str>,
        ctx: AuditContext,
    ) -> Result<Vec<String>, Error> {
        let patterns = explicit_patterns(language, category);
        let record = AuditRecord {
            id: Uuid::new_v4(),
            action: AuditAction::Invalidate,
            entity_kind: AuditEntityKind::Cache,
            entity_id: Uuid::nil(),
            actor: ctx.actor,
            origin: ctx.origin,
            user_agent: ctx.user_agent,
            diff: Some(serde_json::json!({ "patterns": patterns })),
            created_at: Utc::now(),
        };
        self.store.append_audit(record).await?;
        self.invalidate(patterns.clone()).await;
        Ok(patterns)
    }

    /// Read the audit trail.
    pub async fn list_audit(&self, filter: AuditFilter) -> Result<Vec<AuditRecord>, Error> {
        Ok(self.store.list_audit(filter).await?)
    }

    /// Apply invalidation patterns post-commit; queue distributed failures.
    async fn invalidate(&self, patterns: Vec<String>) {
        debug!(?patterns, "invalidating cache patterns");
        let failed = self.cache.invalidate(&patterns).await;
        if failed.is_empty() {
            return;
        }
        if let Err(err) = self.store.enqueue_invalidations(&failed).await {
            // Worst case: remote tiers stay stale until their TTL lapses.
            error!(
                ?failed,
                error = %err,
                "failed to queue distributed invalidation retry"
            );
        }
    }
}

fn language_patterns(language: &Language, default_involved: bool) -> Vec<String> {
    let mut patterns = if default_involved {
        // A default change moves fallback resolution for every language.
        vec![ALL_CATALOGS.to_owned()]
    } else {
        vec![format!("catalog:{}:*", language.code)]
    };
    patterns.push(ALL_LISTINGS.to_owned());
    patterns
}

fn key_patterns(old_category: Option<&str>, new_category: Option<Option<&str>>) -> Vec<String> {
    let mut categories = vec![old_category];
    if let Some(new_category) = new_category {
        categories.push(new_category);
    }
    // An uncategorized key appears in unfiltered catalogs of every language,
    // so touching one wipes globally.
    if categories.iter().any(Option::is_none) {
        return vec![ALL_CATALOGS.to_owned()];
    }
    let mut patterns: Vec<String> = Vec::new();
    for category in categories.into_iter().flatten() {
        let pattern = format!("catalog:*:{category}");
        if !patterns.contains(&pattern) {
            patterns.push(pattern);
        }
    }
    patterns
}

fn localization_patterns(language: &LanguageCode, category: Option<&str>) -> Vec<String> {
    let mut patterns = Vec::new();
    if let Some(category) = category {
        patterns.push(format!("catalog:{language}:{category}"));
    }
    patterns.push(format!("catalog:{language}:*"));
    patterns
}

fn explicit_patterns(language: Option<&LanguageCode>, category: Option<&str>) -> Vec<String> {
    match (language, category) {
        (Some(language), Some(category)) => vec![
            format!("catalog:{language}:{category}"),
            format!("catalog:{language}:{category}:*"),
        ],
        (Some(language), None) => vec![format!("catalog:{language}:*")],
        (None, Some(category)) => vec![
            format!("catalog:*:{category}"),
            format!("catalog:*:{category}:*"),
        ],
        (None, None) => vec![ALL_CATALOGS.to_owned(), ALL_LISTINGS.to_owned()],
    }
}

/// Background drain of the distributed invalidation retry queue.
///
/// Claims due rows, re-applies each pattern to the distributed tier, and
/// reschedules failures with exponential backoff until the attempt budget is
/// exhausted.
pub struct InvalidationRetryTask {
    store: Arc<dyn CatalogStore>,
    cache: Arc<TieredCache>,
    poll_interval: Duration,
    base_backoff: Duration,
    max_backoff: Duration,
    max_attempts: i32,
    claim_limit: i64,
}

impl InvalidationRetryTask {
    /// Create a task with production defaults (30 s poll, 5 s base backoff
    /// capped at 10 min, 10 attempts).
    pub fn new(store: Arc<dyn CatalogStore>, cache: Arc<TieredCache>) -> Self {
        Self {
            store,
            cache,
            poll_interval: Duration::from_secs(30),
            base_backoff: Duration::from_secs(5),
            max_backoff: Duration::from_secs(600),
            max_attempts: 10,
            claim_limit: 64,
        }
    }

    /// Override the poll interval (tests).
    pub const fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Drain rows due at `now` once. Returns how many rows were processed.
    pub async fn run_once(&self, now: DateTime<Utc>) -> usize {
        let due = match self.store.claim_due_invalidations(now, self.claim_limit).await {
            Ok(due) => due,
            Err(err) => {
                warn!(error = %err, "invalidation retry claim failed");
                return 0;
            }
        };
        let processed = due.len();
        for pending in due {
            let outcome = if self.cache.invalidate_distributed(&pending.pattern).await.is_ok() {
                info!(pattern = %pending.pattern, "distributed invalidation retry succeeded");
                InvalidationOutcome::Done
            } else if pending.attempts + 1 >= self.max_attempts {
                error!(
                    pattern = %pending.pattern,
                    attempts = pending.attempts + 1,
                    "distributed invalidation retries exhausted; remote tiers expire by TTL"
                );
                InvalidationOutcome::GiveUp
            } else {
                InvalidationOutcome::RetryAt(now + self.backoff_after(pending.attempts + 1))
            };
            if let Err(err) = self.store.resolve_invalidation(pending.id, outcome).await {
                warn!(pattern = %pending.pattern, error = %err, "invalidation retry bookkeeping failed");
            }
        }
        processed
    }

    /// Spawn the polling loop.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.poll_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.run_once(Utc::now()).await;
            }
        })
    }

    fn backoff_after(&self, attempts: i32) -> chrono::Duration {
        let exponent = attempts.clamp(0, 20) as u32;
        let backoff = self
            .base_backoff
            .saturating_mul(2u32.saturating_pow(exponent.saturating_sub(1)))
            .min(self.max_backoff);
        chrono::Duration::from_std(backoff).unwrap_or_else(|_| chrono::Duration::seconds(600))
    }
}
