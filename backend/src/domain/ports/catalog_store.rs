//! Port for the normalized localization store.
//!
//! The catalog engine depends on this boundary only; the Diesel adapter in
//! `outbound::persistence` is one implementation, the in-memory fake behind
//! the `test-support` feature another. Every mutation takes an
//! [`AuditContext`] and appends its audit record inside the same store
//! transaction, so a committed mutation and its audit entry are inseparable.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::Error;
use crate::domain::audit::{AuditContext, AuditFilter, AuditRecord};
use crate::domain::key::{KeyDraft, KeyPath, KeyUpdate, LocalizationKey};
use crate::domain::language::{Language, LanguageCode, LanguageDraft, LanguageUpdate};
use crate::domain::localization::{Localization, LocalizationUpsert, VariableSchema};
use crate::domain::snapshot::CatalogSnapshot;

use super::define_port_error;

define_port_error! {
    /// Errors surfaced by store adapters.
    pub enum CatalogStoreError {
        /// Connection could not be established or was lost.
        Connection { message: String } => "store connection failed: {message}",
        /// Query failed during execution or row conversion.
        Query { message: String } => "store query failed: {message}",
        /// The addressed entity does not exist (or is soft-deleted).
        NotFound { what: String } => "{what} not found",
        /// A uniqueness constraint was violated.
        Conflict { what: String } => "{what} already exists",
    }
}

impl From<CatalogStoreError> for Error {
    fn from(err: CatalogStoreError) -> Self {
        match err {
            CatalogStoreError::Connection { message } | CatalogStoreError::Query { message } => {
                Self::store(message)
            }
            CatalogStoreError::NotFound { what } => Self::not_found(format!("{what} not found")),
            CatalogStoreError::Conflict { what } => Self::conflict(format!("{what} already exists")),
        }
    }
}

/// One approved entry streamed into a snapshot build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovedEntry {
    pub key: KeyPath,
    pub value: String,
    pub variables: Option<VariableSchema>,
}

/// A distributed-cache invalidation awaiting retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingInvalidation {
    pub id: Uuid,
    pub pattern: String,
    pub attempts: i32,
    pub next_attempt_at: DateTime<Utc>,
}

/// Port for reading and mutating the normalized localization tables.
///
/// Mutations are transactional per call: the entity change and the audit
/// append commit together or not at all. `upsert_localization` must be atomic
/// with respect to concurrent upserts of the same (key, language) pair,
/// including its version bump.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogStore: Send + Sync {
    // -- languages ----------------------------------------------------------

    /// Create a language; fails with `Conflict` on a duplicate code.
    async fn create_language(
        &self,
        draft: LanguageDraft,
        ctx: AuditContext,
    ) -> Result<Language, CatalogStoreError>;

    /// Fetch a non-deleted language by its short code.
    async fn get_language_by_code(
        &self,
        code: &LanguageCode,
    ) -> Result<Language, CatalogStoreError>;

    /// Fetch a non-deleted language by id.
    async fn get_language_by_id(&self, id: Uuid) -> Result<Language, CatalogStoreError>;

    /// List non-deleted languages ordered by code.
    async fn list_languages(&self, active_only: bool) -> Result<Vec<Language>, CatalogStoreError>;

    /// Apply field changes to a language. Setting `default = true` atomically
    /// clears the flag on the previous default.
    async fn update_language(
        &self,
        id: Uuid,
        update: LanguageUpdate,
        ctx: AuditContext,
    ) -> Result<Language, CatalogStoreError>;

    /// Soft-delete a language.
    async fn soft_delete_language(
        &self,
        id: Uuid,
        ctx: AuditContext,
    ) -> Result<Language, CatalogStoreError>;

    /// The language flagged as default; `NotFound` when none is.
    async fn get_default_language(&self) -> Result<Language, CatalogStoreError>;

    // -- keys ---------------------------------------------------------------

    /// Register a key; fails with `Conflict` on a duplicate path.
    async fn create_key(
        &self,
        draft: KeyDraft,
        ctx: AuditContext,
    ) -> Result<LocalizationKey, CatalogStoreError>;

    /// Fetch a non-deleted key by its path.
    async fn get_key_by_value(
        &self,
        key: &KeyPath,
    ) -> Result<LocalizationKey, CatalogStoreError>;

    /// List non-deleted keys in a category ordered by path.
    async fn list_keys_by_category(
        &self,
        category: &str,
    ) -> Result<Vec<LocalizationKey>, CatalogStoreError>;

    /// Apply field changes to a key.
    async fn update_key(
        &self,
        id: Uuid,
        update: KeyUpdate,
        ctx: AuditContext,
    ) -> Result<LocalizationKey, CatalogStoreError>;

    /// Soft-delete a key.
    async fn soft_delete_key(
        &self,
        id: Uuid,
        ctx: AuditContext,
    ) -> Result<LocalizationKey, CatalogStoreError>;

    // -- localizations ------------------------------------------------------

    /// Insert or update the localization for (key, language), creating the
    /// key when absent. Bumps `version` only when value, plural forms, or
    /// variables actually change; sets approver fields when transitioning to
    /// approved.
    async fn upsert_localization(
        &self,
        upsert: LocalizationUpsert,
        ctx: AuditContext,
    ) -> Result<Localization, CatalogStoreError>;

    /// Mark a localization approved; idempotent.
    async fn approve_localization(
        &self,
        id: Uuid,
        ctx: AuditContext,
    ) -> Result<Localization, CatalogStoreError>;

    /// Soft-delete a localization.
    async fn soft_delete_localization(
        &self,
        id: Uuid,
        ctx: AuditContext,
    ) -> Result<Localization, CatalogStoreError>;

    // -- snapshots ----------------------------------------------------------

    /// Approved, non-deleted entries with non-deleted keys for a language,
    /// optionally filtered by exact category, ordered by key path. The read
    /// observes one consistent view of the tables.
    async fn read_approved_entries<'a>(
        &self,
        language_id: Uuid,
        category: Option<&'a str>,
    ) -> Result<Vec<ApprovedEntry>, CatalogStoreError>;

    /// Highest persisted catalog version for (language, category); 0 if none.
    async fn latest_catalog_version<'a>(
        &self,
        language_id: Uuid,
        category: Option<&'a str>,
    ) -> Result<i32, CatalogStoreError>;

    /// Persist a snapshot. Insert-only; a duplicate
    /// (language, category, version) fails with `Conflict`.
    async fn write_snapshot(&self, snapshot: &CatalogSnapshot) -> Result<(), CatalogStoreError>;

    /// Most recent persisted snapshot for (language, category).
    async fn get_latest_snapshot<'a>(
        &self,
        language_id: Uuid,
        category: Option<&'a str>,
    ) -> Result<CatalogSnapshot, CatalogStoreError>;

    // -- audit --------------------------------------------------------------

    /// Append a standalone audit record (used for cache invalidation actions
    /// that carry no entity mutation).
    async fn append_audit(
        &self,
        record: AuditRecord,
    ) -> Result<(), CatalogStoreError>;

    /// Read audit records matching a filter, newest first.
    async fn list_audit(
        &self,
        filter: AuditFilter,
    ) -> Result<Vec<AuditRecord>, CatalogStoreError>;

    // -- invalidation retry queue ------------------------------------------

    /// Enqueue distributed-cache invalidation patterns for retry.
    async fn enqueue_invalidations(
        &self,
        patterns: &[String],
    ) -> Result<(), CatalogStoreError>;

    /// Claim queue rows due at `now`, oldest first.
    async fn claim_due_invalidations(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<PendingInvalidation>, CatalogStoreError>;

    /// Resolve a claimed row: drop it on success, otherwise reschedule at
    /// `next_attempt_at` with the attempt counter bumped.
    async fn resolve_invalidation(
        &self,
        id: Uuid,
        outcome: InvalidationOutcome,
    ) -> Result<(), CatalogStoreError>;

    // -- health -------------------------------------------------------------

    /// Liveness probe against the underlying store.
    async fn ping(&self) -> Result<(), CatalogStoreError>;
}

/// Outcome of one invalidation retry attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidationOutcome {
    /// The pattern was applied; remove the queue row.
    Done,
    /// The attempt failed; retry no earlier than the given instant.
    RetryAt(DateTime<Utc>),
    /// Retries are exhausted; drop the row.
    GiveUp,
}
