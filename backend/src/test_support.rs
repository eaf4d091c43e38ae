//! In-memory catalog store fake for integration tests.
//!
//! Mirrors the Diesel adapter's semantics (soft deletes, uniqueness
//! conflicts, version bumps, audit rows inside the same mutation) over a
//! mutex-guarded state. Read instrumentation (call counters, injectable
//! read delay) makes single-flight and failure-isolation behaviour
//! observable from tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::audit::{
    AuditAction, AuditContext, AuditEntityKind, AuditFilter, AuditRecord,
};
use crate::domain::key::{KeyDraft, KeyPath, KeyUpdate, LocalizationKey};
use crate::domain::language::{Language, LanguageCode, LanguageDraft, LanguageUpdate};
use crate::domain::localization::{Localization, LocalizationUpsert};
use crate::domain::ports::{
    ApprovedEntry, CatalogStore, CatalogStoreError, InvalidationOutcome, PendingInvalidation,
};
use crate::domain::snapshot::CatalogSnapshot;

#[derive(Default)]
struct State {
    languages: Vec<Language>,
    keys: Vec<LocalizationKey>,
    localizations: Vec<Localization>,
    snapshots: Vec<CatalogSnapshot>,
    audits: Vec<AuditRecord>,
    queue: Vec<PendingInvalidation>,
}

/// Mutex-guarded in-memory implementation of the store port.
#[derive(Default)]
pub struct InMemoryCatalogStore {
    state: Mutex<State>,
    read_approved_calls: AtomicUsize,
    read_delay: Mutex<Duration>,
    fail_ping: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl InMemoryCatalogStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// How many times `read_approved_entries` ran.
    pub fn read_approved_calls(&self) -> usize {
        self.read_approved_calls.load(Ordering::SeqCst)
    }

    /// Stretch every `read_approved_entries` call so concurrent readers
    /// overlap deterministically.
    pub fn set_read_delay(&self, delay: Duration) {
        *lock(&self.read_delay) = delay;
    }

    /// Make `ping` fail, simulating a store outage.
    pub fn set_ping_failure(&self, fail: bool) {
        self.fail_ping.store(fail, Ordering::SeqCst);
    }

    /// Snapshot of the audit trail, oldest first.
    pub fn audit_records(&self) -> Vec<AuditRecord> {
        lock(&self.state).audits.clone()
    }

    /// Snapshot of the pending invalidation queue.
    pub fn pending_invalidations(&self) -> Vec<PendingInvalidation> {
        lock(&self.state).queue.clone()
    }

    fn append_audit_locked(
        state: &mut State,
        action: AuditAction,
        entity_kind: AuditEntityKind,
        entity_id: Uuid,
        ctx: &AuditContext,
        diff: Option<serde_json::Value>,
    ) {
        state.audits.push(AuditRecord {
            id: Uuid::new_v4(),
            action,
            entity_kind,
            entity_id,
            actor: ctx.actor.clone(),
            origin: ctx.origin.clone(),
            user_agent: ctx.user_agent.clone(),
            diff,
            created_at: Utc::now(),
        });
    }

    fn insert_key_locked(
        state: &mut State,
        draft: &KeyDraft,
        ctx: &AuditContext,
    ) -> Result<LocalizationKey, CatalogStoreError> {
        if state
            .keys
            .iter()
            .any(|key| !key.deleted && key.key == draft.key)
        {
            return Err(CatalogStoreError::conflict(format!(
                "localization key '{}'",
                draft.key
            )));
        }
        let now = Utc::now();
        let key = LocalizationKey {
            id: Uuid::new_v4(),
            key: draft.key.clone(),
            category: draft.category.clone(),
            description: draft.description.clone(),
            usage_context: draft.usage_context.clone(),
            created_at: now,
            modified_at: now,
            deleted: false,
        };
        Self::append_audit_locked(
            state,
            AuditAction::Create,
            AuditEntityKind::Key,
            key.id,
            ctx,
            Some(serde_json::json!({ "after": { "key": key.key.as_str() } })),
        );
        state.keys.push(key.clone());
        Ok(key)
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalogStore {
    async fn create_language(
        &self,
        draft: LanguageDraft,
        ctx: AuditContext,
    ) -> Result<Language, CatalogStoreError> {
        let mut state = lock(&self.state);
        if state
            .languages
            .iter()
            .any(|lang| !lang.deleted && lang.code == draft.code)
        {
            return Err(CatalogStoreError::conflict(format!(
                "language code '{}'",
                draft.code
            )));
        }
        if draft.default {
            for lang in &mut state.languages {
                if !lang.deleted {
                    lang.default = false;
                }
            }
        }
        let now = Utc::now();
        let language = Language {
            id: Uuid::new_v4(),
            code: draft.code,
            display_name: draft.display_name,
            native_name: draft.native_name,
            rtl: draft.rtl,
            active: draft.active,
            default: draft.default,
            created_at: now,
            modified_at: now,
            deleted: false,
        };
        Self::append_audit_locked(
            &mut state,
            AuditAction::Create,
            AuditEntityKind::Language,
            language.id,
            &ctx,
            Some(serde_json::json!({ "after": { "code": language.code.as_str() } })),
        );
        state.languages.push(language.clone());
        Ok(language)
    }

    async fn get_language_by_code(
        &self,
        code: &LanguageCode,
    ) -> Result<Language, CatalogStoreError> {
        lock(&self.state)
            .languages
            .iter()
            .find(|lang| !lang.deleted && lang.code == *code)
            .cloned()
            .ok_or_else(|| CatalogStoreError::not_found(format!("language '{code}'")))
    }

    async fn get_language_by_id(&self, id: Uuid) -> Result<Language, CatalogStoreError> {
        lock(&self.state)
            .languages
            .iter()
            .find(|lang| !lang.deleted && lang.id == id)
            .cloned()
            .ok_or_else(|| CatalogStoreError::not_found(format!("language {id}")))
    }

    async fn list_languages(&self, active_only: bool) -> Result<Vec<Language>, CatalogStoreError> {
        let mut languages: Vec<Language> = lock(&self.state)
            .languages
            .iter()
            .filter(|lang| !lang.deleted && (!active_only || lang.active))
            .cloned()
            .collect();
        languages.sort_by(|a, b| a.code.as_str().cmp(b.code.as_str()));
        Ok(languages)
    }

    async fn update_language(
        &self,
        id: Uuid,
        update: LanguageUpdate,
        ctx: AuditContext,
    ) -> Result<Language, CatalogStoreError> {
        let mut state = lock(&self.state);
        if update.default == Some(true) {
            for lang in &mut state.languages {
                if !lang.deleted && lang.id != id {
                    lang.default = false;
                }
            }
        }
        let language = state
            .languages
            .iter_mut()
            .find(|lang| !lang.deleted && lang.id == id)
            .ok_or_else(|| CatalogStoreError::not_found(format!("language {id}")))?;
        if let Some(display_name) = update.display_name {
            language.display_name = display_name;
        }
        if let Some(native_name) = update.native_name {
            language.native_name = native_name;
        }
        if let Some(rtl) = update.rtl {
            language.rtl = rtl;
        }
        if let Some(active) = update.active {
            language.active = active;
        }
        if let Some(default) = update.default {
            language.default = default;
        }
        language.modified_at = Utc::now();
        let updated = language.clone();
        Self::append_audit_locked(
            &mut state,
            AuditAction::Update,
            AuditEntityKind::Language,
            id,
            &ctx,
            None,
        );
        Ok(updated)
    }

    async fn soft_delete_language(
        &self,
        id: Uuid,
        ctx: AuditContext,
    ) -> Result<Language, CatalogStoreError> {
        let mut state = lock(&self.state);
        let language = state
            .languages
            .iter_mut()
            .find(|lang| !lang.deleted && lang.id == id)
            .ok_or_else(|| CatalogStoreError::not_found(format!("language {id}")))?;
        language.deleted = true;
        language.modified_at = Utc::now();
        let deleted = language.clone();
        Self::append_audit_locked(
            &mut state,
            AuditAction::Delete,
            AuditEntityKind::Language,
            id,
            &ctx,
            None,
        );
        Ok(deleted)
    }

    async fn get_default_language(&self) -> Result<Language, CatalogStoreError> {
        lock(&self.state)
            .languages
            .iter()
            .find(|lang| !lang.deleted && lang.default)
            .cloned()
            .ok_or_else(|| CatalogStoreError::not_found("default language"))
    }

    async fn create_key(
        &self,
        draft: KeyDraft,
        ctx: AuditContext,
    ) -> Result<LocalizationKey, CatalogStoreError> {
        let mut state = lock(&self.state);
        Self::insert_key_locked(&mut state, &draft, &ctx)
    }

    async fn get_key_by_value(
        &self,
        key: &KeyPath,
    ) -> Result<LocalizationKey, CatalogStoreError> {
        lock(&self.state)
            .keys
            .iter()
            .find(|candidate| !candidate.deleted && candidate.key == *key)
            .cloned()
            .ok_or_else(|| CatalogStoreError::not_found(format!("localization key '{key}'")))
    }

    async fn list_keys_by_category(
        &self,
        category: &str,
    ) -> Result<Vec<LocalizationKey>, CatalogStoreError> {
        let mut keys: Vec<LocalizationKey> = lock(&self.state)
            .keys
            .iter()
            .filter(|key| !key.deleted && key.category.as_deref() == Some(category))
            .cloned()
            .collect();
        keys.sort_by(|a, b| a.key.as_str().cmp(b.key.as_str()));
        Ok(keys)
    }

    async fn update_key(
        &self,
        id: Uuid,
        update: KeyUpdate,
        ctx: AuditContext,
    ) -> Result<LocalizationKey, CatalogStoreError> {
        let mut state = lock(&self.state);
        let key = state
            .keys
            .iter_mut()
            .find(|key| !key.deleted && key.id == id)
            .ok_or_else(|| CatalogStoreError::not_found(format!("localization key {id}")))?;
        if let Some(category) = update.category {
            key.category = category;
        }
        if let Some(description) = update.description {
            key.description = Some(description);
        }
        if let Some(usage_context) = update.usage_context {
            key.usage_context = Some(usage_context);
        }
        key.modified_at = Utc::now();
        let updated = key.clone();
        Self::append_audit_locked(
            &mut state,
            AuditAction::Update,
            AuditEntityKind::Key,
            id,
            &ctx,
            None,
        );
        Ok(updated)
    }

    async fn soft_delete_key(
        &self,
        id: Uuid,
        ctx: AuditContext,
    ) -> Result<LocalizationKey, CatalogStoreError> {
        let mut state = lock(&self.state);
        let key = state
            .keys
            .iter_mut()
            .find(|key| !key.deleted && key.id == id)
            .ok_or_else(|| CatalogStoreError::not_found(format!("localization key {id}")))?;
        key.deleted = true;
        key.modified_at = Utc::now();
        let deleted = key.clone();
        Self::append_audit_locked(
            &mut state,
            AuditAction::Delete,
            AuditEntityKind::Key,
            id,
            &ctx,
            None,
        );
        Ok(deleted)
    }

    async fn upsert_localization(
        &self,
        upsert: LocalizationUpsert,
        ctx: AuditContext,
    ) -> Result<Localization, CatalogStoreError> {
        let mut state = lock(&self.state);
        let language = state
            .languages
            .iter()
            .find(|lang| !lang.deleted && lang.code == upsert.language)
            .cloned()
            .ok_or_else(|| {
                CatalogStoreError::not_found(format!("language '{}'", upsert.language))
            })?;
        let key = match state
            .keys
            .iter()
            .find(|key| !key.deleted && key.key == upsert.key)
            .cloned()
        {
            Some(key) => key,
            None => {
                let draft = KeyDraft {
                    key: upsert.key.clone(),
                    category: upsert.category.clone(),
                    description: None,
                    usage_context: None,
                };
                Self::insert_key_locked(&mut state, &draft, &ctx)?
            }
        };

        let now = Utc::now();
        let existing = state
            .localizations
            .iter_mut()
            .find(|loc| !loc.deleted && loc.key_id == key.id && loc.language_id == language.id);
        let localization = match existing {
            None => {
                let localization = Localization {
                    id: Uuid::new_v4(),
                    key_id: key.id,
                    language_id: language.id,
                    value: upsert.value,
                    plural_forms: upsert.plural_forms,
                    variables: upsert.variables,
                    version: 1,
                    approved: upsert.approved,
                    approved_by: upsert.approved.then(|| ctx.actor.clone()),
                    approved_at: upsert.approved.then_some(now),
                    created_at: now,
                    modified_at: now,
                    deleted: false,
                };
                Self::append_audit_locked(
                    &mut state,
                    AuditAction::Create,
                    AuditEntityKind::Localization,
                    localization.id,
                    &ctx,
                    Some(serde_json::json!({ "after": { "value": localization.value } })),
                );
                state.localizations.push(localization.clone());
                localization
            }
            Some(existing) => {
                let content_changed = existing.value != upsert.value
                    || existing.plural_forms != upsert.plural_forms
                    || existing.variables != upsert.variables;
                let newly_approved = upsert.approved && !existing.approved;
                if !content_changed && !newly_approved {
                    return Ok(existing.clone());
                }
                let before_value = existing.value.clone();
                if content_changed {
                    existing.version += 1;
                    existing.value = upsert.value;
                    existing.plural_forms = upsert.plural_forms;
                    existing.variables = upsert.variables;
                }
                if newly_approved {
                    existing.approved = true;
                    existing.approved_by = Some(ctx.actor.clone());
                    existing.approved_at = Some(now);
                }
                existing.modified_at = now;
                let updated = existing.clone();
                Self::append_audit_locked(
                    &mut state,
                    AuditAction::Update,
                    AuditEntityKind::Localization,
                    updated.id,
                    &ctx,
                    Some(serde_json::json!({
                        "before": { "value": before_value },
                        "after": { "value": updated.value },
                    })),
                );
                updated
            }
        };
        Ok(localization)
    }

    async fn approve_localization(
        &self,
        id: Uuid,
        ctx: AuditContext,
    ) -> Result<Localization, CatalogStoreError> {
        let mut state = lock(&self.state);
        let localization = state
            .localizations
            .iter_mut()
            .find(|loc| !loc.deleted && loc.id == id)
            .ok_or_else(|| CatalogStoreError::not_found(format!("localization {id}")))?;
        if localization.approved {
            return Ok(localization.clone());
        }
        let now = Utc::now();
        localization.approved = true;
        localization.approved_by = Some(ctx.actor.clone());
        localization.approved_at = Some(now);
        localization.modified_at = now;
        let approved = localization.clone();
        Self::append_audit_locked(
            &mut state,
            AuditAction::Approve,
            AuditEntityKind::Localization,
            id,
            &ctx,
            None,
        );
        Ok(approved)
    }

    async fn soft_delete_localization(
        &self,
        id: Uuid,
        ctx: AuditContext,
    ) -> Result<Localization, CatalogStoreError> {
        let mut state = lock(&self.state);
        let localization = state
            .localizations
            .iter_mut()
            .find(|loc| !loc.deleted && loc.id == id)
            .ok_or_else(|| CatalogStoreError::not_found(format!("localization {id}")))?;
        localization.deleted = true;
        localization.modified_at = Utc::now();
        let deleted = localization.clone();
        Self::append_audit_locked(
            &mut state,
            AuditAction::Delete,
            AuditEntityKind::Localization,
            id,
            &ctx,
            None,
        );
        Ok(deleted)
    }

    async fn read_approved_entries<'a>(
        &self,
        language_id: Uuid,
        category: Option<&'a str>,
    ) -> Result<Vec<ApprovedEntry>, CatalogStoreError> {
        self.read_approved_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *lock(&self.read_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let state = lock(&self.state);
        let mut entries: Vec<ApprovedEntry> = state
            .localizations
            .iter()
            .filter(|loc| !loc.deleted && loc.approved && loc.language_id == language_id)
            .filter_map(|loc| {
                let key = state
                    .keys
                    .iter()
                    .find(|key| !key.deleted && key.id == loc.key_id)?;
                if let Some(category) = category {
                    if key.category.as_deref() != Some(category) {
                        return None;
                    }
                }
                Some(ApprovedEntry {
                    key: key.key.clone(),
                    value: loc.value.clone(),
                    variables: loc.variables.clone(),
                })
            })
            .collect();
        entries.sort_by(|a, b| a.key.as_str().cmp(b.key.as_str()));
        Ok(entries)
    }

    async fn latest_catalog_version<'a>(
        &self,
        language_id: Uuid,
        category: Option<&'a str>,
    ) -> Result<i32, CatalogStoreError> {
        Ok(lock(&self.state)
            .snapshots
            .iter()
            .filter(|snap| snap.language_id == language_id && snap.category.as_deref() == category)
            .map(|snap| snap.version)
            .max()
            .unwrap_or(0))
    }

    async fn write_snapshot(
        &self,
        snapshot: &CatalogSnapshot,
    ) -> Result<(), CatalogStoreError> {
        let mut state = lock(&self.state);
        if state.snapshots.iter().any(|existing| {
            existing.language_id == snapshot.language_id
                && existing.category == snapshot.category
                && existing.version == snapshot.version
        }) {
            return Err(CatalogStoreError::conflict("catalog snapshot"));
        }
        state.snapshots.push(snapshot.clone());
        Ok(())
    }

    async fn get_latest_snapshot<'a>(
        &self,
        language_id: Uuid,
        category: Option<&'a str>,
    ) -> Result<CatalogSnapshot, CatalogStoreError> {
        lock(&self.state)
            .snapshots
            .iter()
            .filter(|snap| snap.language_id == language_id && snap.category.as_deref() == category)
            .max_by_key(|snap| snap.version)
            .cloned()
            .ok_or_else(|| CatalogStoreError::not_found("catalog snapshot"))
    }

    async fn append_audit(&self, record: AuditRecord) -> Result<(), CatalogStoreError> {
        lock(&self.state).audits.push(record);
        Ok(())
    }

    async fn list_audit(
        &self,
        filter: AuditFilter,
    ) -> Result<Vec<AuditRecord>, CatalogStoreError> {
        let state = lock(&self.state);
        let mut records: Vec<AuditRecord> = state
            .audits
            .iter()
            .filter(|record| {
                filter
                    .entity_kind
                    .is_none_or(|kind| record.entity_kind == kind)
                    && filter.entity_id.is_none_or(|id| record.entity_id == id)
                    && filter
                        .actor
                        .as_deref()
                        .is_none_or(|actor| record.actor == actor)
                    && filter.from.is_none_or(|from| record.created_at >= from)
                    && filter.until.is_none_or(|until| record.created_at <= until)
            })
            .cloned()
            .collect();
        records.sort_by_key(|record| std::cmp::Reverse(record.created_at));
        let limit = filter.limit.unwrap_or(100).clamp(1, 1000) as usize;
        records.truncate(limit);
        Ok(records)
    }

    async fn enqueue_invalidations(
        &self,
        patterns: &[String],
    ) -> Result<(), CatalogStoreError> {
        let now = Utc::now();
        let mut state = lock(&self.state);
        for pattern in patterns {
            state.queue.push(PendingInvalidation {
                id: Uuid::new_v4(),
                pattern: pattern.clone(),
                attempts: 0,
                next_attempt_at: now,
            });
        }
        Ok(())
    }

    async fn claim_due_invalidations(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<PendingInvalidation>, CatalogStoreError> {
        let state = lock(&self.state);
        let mut due: Vec<PendingInvalidation> = state
            .queue
            .iter()
            .filter(|pending| pending.next_attempt_at <= now)
            .cloned()
            .collect();
        due.sort_by_key(|pending| pending.next_attempt_at);
        due.truncate(limit.max(0) as usize);
        Ok(due)
    }

    async fn resolve_invalidation(
        &self,
        id: Uuid,
        outcome: InvalidationOutcome,
    ) -> Result<(), CatalogStoreError> {
        let mut state = lock(&self.state);
        match outcome {
            InvalidationOutcome::Done | InvalidationOutcome::GiveUp => {
                state.queue.retain(|pending| pending.id != id);
            }
            InvalidationOutcome::RetryAt(next_attempt_at) => {
                if let Some(pending) = state.queue.iter_mut().find(|pending| pending.id == id) {
                    pending.attempts += 1;
                    pending.next_attempt_at = next_attempt_at;
                }
            }
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), CatalogStoreError> {
        if self.fail_ping.load(Ordering::SeqCst) {
            return Err(CatalogStoreError::connection("simulated store outage"));
        }
        Ok(())
    }
}
