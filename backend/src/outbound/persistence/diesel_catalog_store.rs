//! PostgreSQL-backed implementation of the catalog store port.
//!
//! Every mutation runs in one transaction that also appends its audit
//! record, so a committed change and its trail are inseparable. Row locks
//! (`FOR UPDATE`) serialize concurrent upserts of the same (key, language)
//! pair; the partial unique indexes on non-deleted rows surface duplicate
//! codes, keys, and snapshot fingerprints as conflicts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::result::Error as DieselError;
use diesel_async::scoped_futures::ScopedFutureExt as _;
use diesel_async::{AsyncConnection as _, AsyncPgConnection, RunQueryDsl};
use serde_json::json;
use uuid::Uuid;

use crate::domain::audit::{
    AuditAction, AuditContext, AuditEntityKind, AuditFilter, AuditRecord, changed_fields_diff,
};
use crate::domain::key::{KeyDraft, KeyPath, KeyUpdate, LocalizationKey};
use crate::domain::language::{Language, LanguageCode, LanguageDraft, LanguageUpdate};
use crate::domain::localization::{Localization, LocalizationUpsert};
use crate::domain::ports::{
    ApprovedEntry, CatalogStore, CatalogStoreError, InvalidationOutcome, PendingInvalidation,
};
use crate::domain::snapshot::CatalogSnapshot;

use super::diesel_helpers::{collect_rows, map_diesel_error, map_pool_error};
use super::models::{
    AuditRow, CacheKeyRow, CatalogRow, KeyRow, LanguageRow, LocalizationRow, NewAuditRow,
    NewCacheKeyRow, NewCatalogRow, NewKeyRow, NewLanguageRow, NewLocalizationRow,
    json_to_variable_schema, variable_schema_to_json,
};
use super::pool::DbPool;
use super::schema::{
    languages, localization_audit_log, localization_cache_keys, localization_catalogs,
    localization_keys, localizations,
};

/// Diesel-backed implementation of the catalog store port.
#[derive(Clone)]
pub struct DieselCatalogStore {
    pool: DbPool,
}

impl DieselCatalogStore {
    /// Create a new store over the given connection pool.
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn conn(
        &self,
    ) -> Result<
        diesel_async::pooled_connection::bb8::PooledConnection<'_, AsyncPgConnection>,
        CatalogStoreError,
    > {
        self.pool.get().await.map_err(map_pool_error)
    }
}

/// Transaction-internal error carrying either a driver failure or an
/// already-shaped port error.
enum TxnError {
    Diesel(DieselError),
    Store(CatalogStoreError),
}

impl From<DieselError> for TxnError {
    fn from(error: DieselError) -> Self {
        Self::Diesel(error)
    }
}

impl TxnError {
    fn not_found(what: impl Into<String>) -> Self {
        Self::Store(CatalogStoreError::not_found(what.into()))
    }

    fn query(message: impl Into<String>) -> Self {
        Self::Store(CatalogStoreError::query(message.into()))
    }

    fn finish(self, what: &str) -> CatalogStoreError {
        match self {
            Self::Diesel(error) => map_diesel_error(error, what),
            Self::Store(error) => error,
        }
    }
}

async fn append_audit_row(
    conn: &mut AsyncPgConnection,
    action: AuditAction,
    entity_kind: AuditEntityKind,
    entity_id: Uuid,
    ctx: &AuditContext,
    diff: Option<serde_json::Value>,
) -> Result<(), DieselError> {
    let row = NewAuditRow {
        id: Uuid::new_v4(),
        action: action.as_str().to_owned(),
        entity_kind: entity_kind.as_str().to_owned(),
        entity_id,
        actor: ctx.actor.clone(),
        origin: ctx.origin.clone(),
        user_agent: ctx.user_agent.clone(),
        diff,
        created_at: Utc::now(),
    };
    diesel::insert_into(localization_audit_log::table)
        .values(&row)
        .execute(conn)
        .await
        .map(|_| ())
}

async fn load_language(
    conn: &mut AsyncPgConnection,
    id: Uuid,
    lock: bool,
) -> Result<LanguageRow, TxnError> {
    let base = languages::table
        .filter(languages::id.eq(id))
        .filter(languages::deleted.eq(false))
        .select(LanguageRow::as_select());
    let row = if lock {
        base.for_update().first(conn).await.optional()?
    } else {
        base.first(conn).await.optional()?
    };
    row.ok_or_else(|| TxnError::not_found(format!("language {id}")))
}

fn language_fields(row: &LanguageRow) -> Vec<(&'static str, serde_json::Value)> {
    vec![
        ("code", json!(row.code)),
        ("displayName", json!(row.display_name)),
        ("nativeName", json!(row.native_name)),
        ("rtl", json!(row.rtl)),
        ("active", json!(row.active)),
        ("default", json!(row.is_default)),
    ]
}

async fn clear_default_language(
    conn: &mut AsyncPgConnection,
    except: Uuid,
) -> Result<(), DieselError> {
    diesel::update(
        languages::table
            .filter(languages::is_default.eq(true))
            .filter(languages::deleted.eq(false))
            .filter(languages::id.ne(except)),
    )
    .set((
        languages::is_default.eq(false),
        languages::modified_at.eq(Utc::now()),
    ))
    .execute(conn)
    .await
    .map(|_| ())
}

#[async_trait]
impl CatalogStore for DieselCatalogStore {
    async fn create_language(
        &self,
        draft: LanguageDraft,
        ctx: AuditContext,
    ) -> Result<Language, CatalogStoreError> {
        let what = format!("language code '{}'", draft.code);
        let mut conn = self.conn().await?;
        let row = conn
            .transaction(|conn| {
                async move {
                    let now = Utc::now();
                    let row = NewLanguageRow {
                        id: Uuid::new_v4(),
                        code: draft.code.as_str().to_owned(),
                        display_name: draft.display_name,
                        native_name: draft.native_name,
                        rtl: draft.rtl,
                        active: draft.active,
                        is_default: draft.default,
                        created_at: now,
                        modified_at: now,
                        deleted: false,
                    };
                    if draft.default {
                        clear_default_language(conn, row.id).await?;
                    }
                    diesel::insert_into(languages::table)
                        .values(&row)
                        .execute(conn)
                        .await?;
                    let created: LanguageRow = languages::table
                        .filter(languages::id.eq(row.id))
                        .select(LanguageRow::as_select())
                        .first(conn)
                        .await?;
                    let diff = json!({ "after": serde_json::Map::from_iter(
                        language_fields(&created).into_iter().map(|(k, v)| (k.to_owned(), v)),
                    ) });
                    append_audit_row(
                        conn,
                        AuditAction::Create,
                        AuditEntityKind::Language,
                        created.id,
                        &ctx,
                        Some(diff),
                    )
                    .await?;
                    Ok::<_, TxnError>(created)
                }
                .scope_boxed()
            })
            .await
            .map_err(|err| err.finish(&what))?;
        row.into_domain().map_err(CatalogStoreError::query)
    }

    async fn get_language_by_code(
        &self,
        code: &LanguageCode,
    ) -> Result<Language, CatalogStoreError> {
        let what = format!("language '{code}'");
        let mut conn = self.conn().await?;
        let row: Option<LanguageRow> = languages::table
            .filter(languages::code.eq(code.as_str()))
            .filter(languages::deleted.eq(false))
            .select(LanguageRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(|err| map_diesel_error(err, &what))?;
        row.ok_or_else(|| CatalogStoreError::not_found(what))?
            .into_domain()
            .map_err(CatalogStoreError::query)
    }

    async fn get_language_by_id(&self, id: Uuid) -> Result<Language, CatalogStoreError> {
        let what = format!("language {id}");
        let mut conn = self.conn().await?;
        let row: Option<LanguageRow> = languages::table
            .filter(languages::id.eq(id))
            .filter(languages::deleted.eq(false))
            .select(LanguageRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(|err| map_diesel_error(err, &what))?;
        row.ok_or_else(|| CatalogStoreError::not_found(what))?
            .into_domain()
            .map_err(CatalogStoreError::query)
    }

    async fn list_languages(&self, active_only: bool) -> Result<Vec<Language>, CatalogStoreError> {
        let mut conn = self.conn().await?;
        let mut query = languages::table
            .filter(languages::deleted.eq(false))
            .select(LanguageRow::as_select())
            .order_by(languages::code)
            .into_boxed();
        if active_only {
            query = query.filter(languages::active.eq(true));
        }
        let rows: Vec<LanguageRow> = query
            .load(&mut conn)
            .await
            .map_err(|err| map_diesel_error(err, "languages"))?;
        collect_rows(rows.into_iter().map(LanguageRow::into_domain))
    }

    async fn update_language(
        &self,
        id: Uuid,
        update: LanguageUpdate,
        ctx: AuditContext,
    ) -> Result<Language, CatalogStoreError> {
        let what = format!("language {id}");
        let mut conn = self.conn().await?;
        let row = conn
            .transaction(|conn| {
                async move {
                    let before = load_language(conn, id, true).await?;
                    let display_name =
                        update.display_name.unwrap_or_else(|| before.display_name.clone());
                    let native_name =
                        update.native_name.unwrap_or_else(|| before.native_name.clone());
                    let rtl = update.rtl.unwrap_or(before.rtl);
                    let active = update.active.unwrap_or(before.active);
                    let is_default = update.default.unwrap_or(before.is_default);
                    if is_default && !before.is_default {
                        clear_default_language(conn, id).await?;
                    }
                    diesel::update(languages::table.filter(languages::id.eq(id)))
                        .set((
                            languages::display_name.eq(&display_name),
                            languages::native_name.eq(&native_name),
                            languages::rtl.eq(rtl),
                            languages::active.eq(active),
                            languages::is_default.eq(is_default),
                            languages::modified_at.eq(Utc::now()),
                        ))
                        .execute(conn)
                        .await?;
                    let after: LanguageRow = languages::table
                        .filter(languages::id.eq(id))
                        .select(LanguageRow::as_select())
                        .first(conn)
                        .await?;
                    let diff = diff_between(&language_fields(&before), &language_fields(&after));
                    append_audit_row(
                        conn,
                        AuditAction::Update,
                        AuditEntityKind::Language,
                        id,
                        &ctx,
                        diff,
                    )
                    .await?;
                    Ok::<_, TxnError>(after)
                }
                .scope_boxed()
            })
            .await
            .map_err(|err| err.finish(&what))?;
        row.into_domain().map_err(CatalogStoreError::query)
    }

    async fn soft_delete_language(
        &self,
        id: Uuid,
        ctx: AuditContext,
    ) -> Result<Language, CatalogStoreError> {
        let what = format!("language {id}");
        let mut conn = self.conn().await?;
        let row = conn
            .transaction(|conn| {
                async move {
                    let before = load_language(conn, id, true).await?;
                    diesel::update(languages::table.filter(languages::id.eq(id)))
                        .set((
                            languages::deleted.eq(true),
                            languages::modified_at.eq(Utc::now()),
                        ))
                        .execute(conn)
                        .await?;
                    let diff = json!({ "before": serde_json::Map::from_iter(
                        language_fields(&before).into_iter().map(|(k, v)| (k.to_owned(), v)),
                    ) });
                    append_audit_row(
                        conn,
                        AuditAction::Delete,
                        AuditEntityKind::Language,
                        id,
                        &ctx,
                        Some(diff),
                    )
                    .await?;
                    let mut deleted = before;
                    deleted.deleted = true;
                    Ok::<_, TxnError>(deleted)
                }
                .scope_boxed()
            })
            .await
            .map_err(|err| err.finish(&what))?;
        row.into_domain().map_err(CatalogStoreError::query)
    }

    async fn get_default_language(&self) -> Result<Language, CatalogStoreError> {
        let mut conn = self.conn().await?;
        let row: Option<LanguageRow> = languages::table
            .filter(languages::is_default.eq(true))
            .filter(languages::deleted.eq(false))
            .select(LanguageRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(|err| map_diesel_error(err, "default language"))?;
        row.ok_or_else(|| CatalogStoreError::not_found("default language"))?
            .into_domain()
            .map_err(CatalogStoreError::query)
    }

    async fn create_key(
        &self,
        draft: KeyDraft,
        ctx: AuditContext,
    ) -> Result<LocalizationKey, CatalogStoreError> {
        let what = format!("localization key '{}'", draft.key);
        let mut conn = self.conn().await?;
        let row = conn
            .transaction(|conn| {
                async move {
                    let created = insert_key(conn, &draft, &ctx).await?;
                    Ok::<_, TxnError>(created)
                }
                .scope_boxed()
            })
            .await
            .map_err(|err| err.finish(&what))?;
        row.into_domain().map_err(CatalogStoreError::query)
    }

    async fn get_key_by_value(
        &self,
        key: &KeyPath,
    ) -> Result<LocalizationKey, CatalogStoreError> {
        let what = format!("localization key '{key}'");
        let mut conn = self.conn().await?;
        let row: Option<KeyRow> = localization_keys::table
            .filter(localization_keys::key.eq(key.as_str()))
            .filter(localization_keys::deleted.eq(false))
            .select(KeyRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(|err| map_diesel_error(err, &what))?;
        row.ok_or_else(|| CatalogStoreError::not_found(what))?
            .into_domain()
            .map_err(CatalogStoreError::query)
    }

    async fn list_keys_by_category(
        &self,
        category: &str,
    ) -> Result<Vec<LocalizationKey>, CatalogStoreError> {
        let mut conn = self.conn().await?;
        let rows: Vec<KeyRow> = localization_keys::table
            .filter(localization_keys::category.eq(category))
            .filter(localization_keys::deleted.eq(false))
            .select(KeyRow::as_select())
            .order_by(localization_keys::key)
            .load(&mut conn)
            .await
            .map_err(|err| map_diesel_error(err, "localization keys"))?;
        collect_rows(rows.into_iter().map(KeyRow::into_domain))
    }

    async fn update_key(
        &self,
        id: Uuid,
        update: KeyUpdate,
        ctx: AuditContext,
    ) -> Result<LocalizationKey, CatalogStoreError> {
        let what = format!("localization key {id}");
        let mut conn = self.conn().await?;
        let row = conn
            .transaction(|conn| {
                async move {
                    let before: KeyRow = localization_keys::table
                        .filter(localization_keys::id.eq(id))
                        .filter(localization_keys::deleted.eq(false))
                        .select(KeyRow::as_select())
                        .for_update()
                        .first(conn)
                        .await
                        .optional()?
                        .ok_or_else(|| TxnError::not_found(format!("localization key {id}")))?;
                    let category = match update.category {
                        Some(new_category) => new_category,
                        None => before.category.clone(),
                    };
                    let description =
                        update.description.map_or_else(|| before.description.clone(), Some);
                    let usage_context = update
                        .usage_context
                        .map_or_else(|| before.usage_context.clone(), Some);
                    diesel::update(localization_keys::table.filter(localization_keys::id.eq(id)))
                        .set((
                            localization_keys::category.eq(&category),
                            localization_keys::description.eq(&description),
                            localization_keys::usage_context.eq(&usage_context),
                            localization_keys::modified_at.eq(Utc::now()),
                        ))
                        .execute(conn)
                        .await?;
                    let after: KeyRow = localization_keys::table
                        .filter(localization_keys::id.eq(id))
                        .select(KeyRow::as_select())
                        .first(conn)
                        .await?;
                    let diff = changed_fields_diff(&[
                        ("category", json!(before.category), json!(after.category)),
                        (
                            "description",
                            json!(before.description),
                            json!(after.description),
                        ),
                        (
                            "usageContext",
                            json!(before.usage_context),
                            json!(after.usage_context),
                        ),
                    ]);
                    append_audit_row(
                        conn,
                        AuditAction::Update,
                        AuditEntityKind::Key,
                        id,
                        &ctx,
                        diff,
                    )
                    .await?;
                    Ok::<_, TxnError>(after)
                }
                .scope_boxed()
            })
            .await
            .map_err(|err| err.finish(&what))?;
        row.into_domain().map_err(CatalogStoreError::query)
    }

    async fn soft_delete_key(
        &self,
        id: Uuid,
        ctx: AuditContext,
    ) -> Result<LocalizationKey, CatalogStoreError> {
        let what = format!("localization key {id}");
        let mut conn = self.conn().await?;
        let row = conn
            .transaction(|conn| {
                async move {
                    let before: KeyRow = localization_keys::table
                        .filter(localization_keys::id.eq(id))
                        .filter(localization_keys::deleted.eq(false))
                        .select(KeyRow::as_select())
                        .for_update()
                        .first(conn)
                        .await
                        .optional()?
                        .ok_or_else(|| TxnError::not_found(format!("localization key {id}")))?;
                    // Localizations of a deleted key become invisible through
                    // the key join; they are retained for restore tooling.
                    diesel::update(localization_keys::table.filter(localization_keys::id.eq(id)))
                        .set((
                            localization_keys::deleted.eq(true),
                            localization_keys::modified_at.eq(Utc::now()),
                        ))
                        .execute(conn)
                        .await?;
                    let diff = json!({ "before": { "key": before.key, "category": before.category } });
                    append_audit_row(
                        conn,
                        AuditAction::Delete,
                        AuditEntityKind::Key,
                        id,
                        &ctx,
                        Some(diff),
                    )
                    .await?;
                    let mut deleted = before;
                    deleted.deleted = true;
                    Ok::<_, TxnError>(deleted)
                }
                .scope_boxed()
            })
            .await
            .map_err(|err| err.finish(&what))?;
        row.into_domain().map_err(CatalogStoreError::query)
    }

    async fn upsert_localization(
        &self,
        upsert: LocalizationUpsert,
        ctx: AuditContext,
    ) -> Result<Localization, CatalogStoreError> {
        let what = format!(
            "localization ('{}', '{}')",
            upsert.key, upsert.language
        );
        let mut conn = self.conn().await?;
        let row = conn
            .transaction(|conn| {
                async move {
                    let language: LanguageRow = languages::table
                        .filter(languages::code.eq(upsert.language.as_str()))
                        .filter(languages::deleted.eq(false))
                        .select(LanguageRow::as_select())
                        .first(conn)
                        .await
                        .optional()?
                        .ok_or_else(|| {
                            TxnError::not_found(format!("language '{}'", upsert.language))
                        })?;

                    let key_row = match localization_keys::table
                        .filter(localization_keys::key.eq(upsert.key.as_str()))
                        .filter(localization_keys::deleted.eq(false))
                        .select(KeyRow::as_select())
                        .first(conn)
                        .await
                        .optional()?
                    {
                        Some(row) => row,
                        None => {
                            let draft = KeyDraft {
                                key: upsert.key.clone(),
                                category: upsert.category.clone(),
                                description: None,
                                usage_context: None,
                            };
                            insert_key(conn, &draft, &ctx).await?
                        }
                    };

                    let variables = upsert
                        .variables
                        .as_ref()
                        .map(variable_schema_to_json)
                        .transpose()
                        .map_err(TxnError::query)?;

                    let existing: Option<LocalizationRow> = localizations::table
                        .filter(localizations::key_id.eq(key_row.id))
                        .filter(localizations::language_id.eq(language.id))
                        .filter(localizations::deleted.eq(false))
                        .select(LocalizationRow::as_select())
                        .for_update()
                        .first(conn)
                        .await
                        .optional()?;

                    let now = Utc::now();
                    let updated = match existing {
                        None => {
                            let row = NewLocalizationRow {
                                id: Uuid::new_v4(),
                                key_id: key_row.id,
                                language_id: language.id,
                                value: upsert.value.clone(),
                                plural_forms: upsert.plural_forms.clone(),
                                variables,
                                version: 1,
                                approved: upsert.approved,
                                approved_by: upsert.approved.then(|| ctx.actor.clone()),
                                approved_at: upsert.approved.then_some(now),
                                created_at: now,
                                modified_at: now,
                                deleted: false,
                            };
                            diesel::insert_into(localizations::table)
                                .values(&row)
                                .execute(conn)
                                .await?;
                            let diff = json!({ "after": {
                                "value": row.value,
                                "approved": row.approved,
                                "version": row.version,
                            } });
                            append_audit_row(
                                conn,
                                AuditAction::Create,
                                AuditEntityKind::Localization,
                                row.id,
                                &ctx,
                                Some(diff),
                            )
                            .await?;
                            localizations::table
                                .filter(localizations::id.eq(row.id))
                                .select(LocalizationRow::as_select())
                                .first(conn)
                                .await?
                        }
                        Some(before) => {
                            let content_changed = before.value != upsert.value
                                || before.plural_forms != upsert.plural_forms
                                || before.variables != variables;
                            let newly_approved = upsert.approved && !before.approved;
                            if !content_changed && !newly_approved {
                                return Ok::<_, TxnError>(before);
                            }
                            let version = if content_changed {
                                before.version + 1
                            } else {
                                before.version
                            };
                            let approved = before.approved || upsert.approved;
                            let approved_by = if newly_approved {
                                Some(ctx.actor.clone())
                            } else {
                                before.approved_by.clone()
                            };
                            let approved_at = if newly_approved {
                                Some(now)
                            } else {
                                before.approved_at
                            };
                            diesel::update(
                                localizations::table.filter(localizations::id.eq(before.id)),
                            )
                            .set((
                                localizations::value.eq(&upsert.value),
                                localizations::plural_forms.eq(&upsert.plural_forms),
                                localizations::variables.eq(&variables),
                                localizations::version.eq(version),
                                localizations::approved.eq(approved),
                                localizations::approved_by.eq(&approved_by),
                                localizations::approved_at.eq(approved_at),
                                localizations::modified_at.eq(now),
                            ))
                            .execute(conn)
                            .await?;
                            let diff = changed_fields_diff(&[
                                ("value", json!(before.value), json!(upsert.value)),
                                ("version", json!(before.version), json!(version)),
                                ("approved", json!(before.approved), json!(approved)),
                            ]);
                            append_audit_row(
                                conn,
                                AuditAction::Update,
                                AuditEntityKind::Localization,
                                before.id,
                                &ctx,
                                diff,
                            )
                            .await?;
                            localizations::table
                                .filter(localizations::id.eq(before.id))
                                .select(LocalizationRow::as_select())
                                .first(conn)
                                .await?
                        }
                    };
                    Ok::<_, TxnError>(updated)
                }
                .scope_boxed()
            })
            .await
            .map_err(|err| err.finish(&what))?;
        row.into_domain().map_err(CatalogStoreError::query)
    }

    async fn approve_localization(
        &self,
        id: Uuid,
        ctx: AuditContext,
    ) -> Result<Localization, CatalogStoreError> {
        let what = format!("localization {id}");
        let mut conn = self.conn().await?;
        let row = conn
            .transaction(|conn| {
                async move {
                    let before: LocalizationRow = localizations::table
                        .filter(localizations::id.eq(id))
                        .filter(localizations::deleted.eq(false))
                        .select(LocalizationRow::as_select())
                        .for_update()
                        .first(conn)
                        .await
                        .optional()?
                        .ok_or_else(|| TxnError::not_found(format!("localization {id}")))?;
                    if before.approved {
                        // Idempotent: approving twice neither rewrites the
                        // approver nor appends a second audit record.
                        return Ok::<_, TxnError>(before);
                    }
                    let now = Utc::now();
                    diesel::update(localizations::table.filter(localizations::id.eq(id)))
                        .set((
                            localizations::approved.eq(true),
                            localizations::approved_by.eq(Some(ctx.actor.clone())),
                            localizations::approved_at.eq(Some(now)),
                            localizations::modified_at.eq(now),
                        ))
                        .execute(conn)
                        .await?;
                    let diff = changed_fields_diff(&[(
                        "approved",
                        json!(before.approved),
                        json!(true),
                    )]);
                    append_audit_row(
                        conn,
                        AuditAction::Approve,
                        AuditEntityKind::Localization,
                        id,
                        &ctx,
                        diff,
                    )
                    .await?;
                    let after = localizations::table
                        .filter(localizations::id.eq(id))
                        .select(LocalizationRow::as_select())
                        .first(conn)
                        .await?;
                    Ok::<_, TxnError>(after)
                }
                .scope_boxed()
            })
            .await
            .map_err(|err| err.finish(&what))?;
        row.into_domain().map_err(CatalogStoreError::query)
    }

    async fn soft_delete_localization(
        &self,
        id: Uuid,
        ctx: AuditContext,
    ) -> Result<Localization, CatalogStoreError> {
        let what = format!("localization {id}");
        let mut conn = self.conn().await?;
        let row = conn
            .transaction(|conn| {
                async move {
                    let before: LocalizationRow = localizations::table
                        .filter(localizations::id.eq(id))
                        .filter(localizations::deleted.eq(false))
                        .select(LocalizationRow::as_select())
                        .for_update()
                        .first(conn)
                        .await
                        .optional()?
                        .ok_or_else(|| TxnError::not_found(format!("localization {id}")))?;
                    diesel::update(localizations::table.filter(localizations::id.eq(id)))
                        .set((
                            localizations::deleted.eq(true),
                            localizations::modified_at.eq(Utc::now()),
                        ))
                        .execute(conn)
                        .await?;
                    let diff = json!({ "before": { "value": before.value } });
                    append_audit_row(
                        conn,
                        AuditAction::Delete,
                        AuditEntityKind::Localization,
                        id,
                        &ctx,
                        Some(diff),
                    )
                    .await?;
                    let mut deleted = before;
                    deleted.deleted = true;
                    Ok::<_, TxnError>(deleted)
                }
                .scope_boxed()
            })
            .await
            .map_err(|err| err.finish(&what))?;
        row.into_domain().map_err(CatalogStoreError::query)
    }

    async fn read_approved_entries<'a>(
        &self,
        language_id: Uuid,
        category: Option<&'a str>,
    ) -> Result<Vec<ApprovedEntry>, CatalogStoreError> {
        let mut conn = self.conn().await?;
        let mut query = localizations::table
            .inner_join(localization_keys::table)
            .filter(localizations::language_id.eq(language_id))
            .filter(localizations::approved.eq(true))
            .filter(localizations::deleted.eq(false))
            .filter(localization_keys::deleted.eq(false))
            .select((
                localization_keys::key,
                localizations::value,
                localizations::variables,
            ))
            .order_by(localization_keys::key)
            .into_boxed();
        if let Some(category) = category {
            query = query.filter(localization_keys::category.eq(category));
        }
        let rows: Vec<(String, String, Option<serde_json::Value>)> = query
            .load(&mut conn)
            .await
            .map_err(|err| map_diesel_error(err, "approved entries"))?;
        collect_rows(rows.into_iter().map(|(key, value, variables)| {
            let key = KeyPath::new(key).map_err(|e| e.to_string())?;
            let variables = variables.map(json_to_variable_schema).transpose()?;
            Ok(ApprovedEntry {
                key,
                value,
                variables,
            })
        }))
    }

    async fn latest_catalog_version<'a>(
        &self,
        language_id: Uuid,
        category: Option<&'a str>,
    ) -> Result<i32, CatalogStoreError> {
        let mut conn = self.conn().await?;
        let mut query = localization_catalogs::table
            .filter(localization_catalogs::language_id.eq(language_id))
            .select(diesel::dsl::max(localization_catalogs::catalog_version))
            .into_boxed();
        query = match category {
            Some(category) => query.filter(localization_catalogs::category.eq(category)),
            None => query.filter(localization_catalogs::category.is_null()),
        };
        let version: Option<i32> = query
            .first(&mut conn)
            .await
            .map_err(|err| map_diesel_error(err, "catalog version"))?;
        Ok(version.unwrap_or(0))
    }

    async fn write_snapshot(
        &self,
        snapshot: &CatalogSnapshot,
    ) -> Result<(), CatalogStoreError> {
        let mut conn = self.conn().await?;
        let catalog = serde_json::to_value(&snapshot.entries)
            .map_err(|err| CatalogStoreError::query(err.to_string()))?;
        let row = NewCatalogRow {
            id: snapshot.id,
            language_id: snapshot.language_id,
            category: snapshot.category.clone(),
            catalog_version: snapshot.version,
            checksum: snapshot.checksum.to_hex(),
            catalog,
            created_at: snapshot.created_at,
        };
        diesel::insert_into(localization_catalogs::table)
            .values(&row)
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(|err| map_diesel_error(err, "catalog snapshot"))
    }

    async fn get_latest_snapshot<'a>(
        &self,
        language_id: Uuid,
        category: Option<&'a str>,
    ) -> Result<CatalogSnapshot, CatalogStoreError> {
        let mut conn = self.conn().await?;
        let mut query = localization_catalogs::table
            .filter(localization_catalogs::language_id.eq(language_id))
            .select(CatalogRow::as_select())
            .order_by(localization_catalogs::catalog_version.desc())
            .into_boxed();
        query = match category {
            Some(category) => query.filter(localization_catalogs::category.eq(category)),
            None => query.filter(localization_catalogs::category.is_null()),
        };
        let row: Option<CatalogRow> = query
            .first(&mut conn)
            .await
            .optional()
            .map_err(|err| map_diesel_error(err, "catalog snapshot"))?;
        let row = row.ok_or_else(|| CatalogStoreError::not_found("catalog snapshot"))?;
        let language: Option<LanguageRow> = languages::table
            .filter(languages::id.eq(row.language_id))
            .select(LanguageRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(|err| map_diesel_error(err, "language"))?;
        let language = language
            .ok_or_else(|| CatalogStoreError::not_found(format!("language {language_id}")))?
            .into_domain()
            .map_err(CatalogStoreError::query)?;
        row.into_domain(language.code)
            .map_err(CatalogStoreError::query)
    }

    async fn append_audit(&self, record: AuditRecord) -> Result<(), CatalogStoreError> {
        let mut conn = self.conn().await?;
        diesel::insert_into(localization_audit_log::table)
            .values(&NewAuditRow::from_domain(record))
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(|err| map_diesel_error(err, "audit record"))
    }

    async fn list_audit(
        &self,
        filter: AuditFilter,
    ) -> Result<Vec<AuditRecord>, CatalogStoreError> {
        let mut conn = self.conn().await?;
        let mut query = localization_audit_log::table
            .select(AuditRow::as_select())
            .order_by(localization_audit_log::created_at.desc())
            .into_boxed();
        if let Some(entity_kind) = filter.entity_kind {
            query = query.filter(localization_audit_log::entity_kind.eq(entity_kind.as_str()));
        }
        if let Some(entity_id) = filter.entity_id {
            query = query.filter(localization_audit_log::entity_id.eq(entity_id));
        }
        if let Some(actor) = filter.actor {
            query = query.filter(localization_audit_log::actor.eq(actor));
        }
        if let Some(from) = filter.from {
            query = query.filter(localization_audit_log::created_at.ge(from));
        }
        if let Some(until) = filter.until {
            query = query.filter(localization_audit_log::created_at.le(until));
        }
        let limit = filter.limit.unwrap_or(100).clamp(1, 1000);
        let rows: Vec<AuditRow> = query
            .limit(limit)
            .load(&mut conn)
            .await
            .map_err(|err| map_diesel_error(err, "audit records"))?;
        collect_rows(rows.into_iter().map(AuditRow::into_domain))
    }

    async fn enqueue_invalidations(
        &self,
        patterns: &[String],
    ) -> Result<(), CatalogStoreError> {
        if patterns.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn().await?;
        let now = Utc::now();
        let rows: Vec<NewCacheKeyRow> = patterns
            .iter()
            .map(|pattern| NewCacheKeyRow {
                id: Uuid::new_v4(),
                pattern: pattern.clone(),
                attempts: 0,
                next_attempt_at: now,
                created_at: now,
            })
            .collect();
        diesel::insert_into(localization_cache_keys::table)
            .values(&rows)
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(|err| map_diesel_error(err, "invalidation queue"))
    }

    async fn claim_due_invalidations(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<PendingInvalidation>, CatalogStoreError> {
        let mut conn = self.conn().await?;
        let rows: Vec<CacheKeyRow> = localization_cache_keys::table
            .filter(localization_cache_keys::next_attempt_at.le(now))
            .select(CacheKeyRow::as_select())
            .order_by(localization_cache_keys::next_attempt_at)
            .limit(limit)
            .load(&mut conn)
            .await
            .map_err(|err| map_diesel_error(err, "invalidation queue"))?;
        Ok(rows.into_iter().map(PendingInvalidation::from).collect())
    }

    async fn resolve_invalidation(
        &self,
        id: Uuid,
        outcome: InvalidationOutcome,
    ) -> Result<(), CatalogStoreError> {
        let mut conn = self.conn().await?;
        match outcome {
            InvalidationOutcome::Done | InvalidationOutcome::GiveUp => diesel::delete(
                localization_cache_keys::table.filter(localization_cache_keys::id.eq(id)),
            )
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(|err| map_diesel_error(err, "invalidation queue")),
            InvalidationOutcome::RetryAt(next_attempt_at) => diesel::update(
                localization_cache_keys::table.filter(localization_cache_keys::id.eq(id)),
            )
            .set((
                localization_cache_keys::attempts
                    .eq(localization_cache_keys::attempts + 1),
                localization_cache_keys::next_attempt_at.eq(next_attempt_at),
            ))
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(|err| map_diesel_error(err, "invalidation queue")),
        }
    }

    async fn ping(&self) -> Result<(), CatalogStoreError> {
        let mut conn = self.conn().await?;
        diesel::sql_query("SELECT 1")
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(|err| map_diesel_error(err, "ping"))
    }
}

async fn insert_key(
    conn: &mut AsyncPgConnection,
    draft: &KeyDraft,
    ctx: &AuditContext,
) -> Result<KeyRow, TxnError> {
    let now = Utc::now();
    let row = NewKeyRow {
        id: Uuid::new_v4(),
        key: draft.key.as_str().to_owned(),
        category: draft.category.clone(),
        description: draft.description.clone(),
        usage_context: draft.usage_context.clone(),
        created_at: now,
        modified_at: now,
        deleted: false,
    };
    diesel::insert_into(localization_keys::table)
        .values(&row)
        .execute(conn)
        .await?;
    let diff = json!({ "after": { "key": row.key, "category": row.category } });
    append_audit_row(
        conn,
        AuditAction::Create,
        AuditEntityKind::Key,
        row.id,
        ctx,
        Some(diff),
    )
    .await?;
    let created = localization_keys::table
        .filter(localization_keys::id.eq(row.id))
        .select(KeyRow::as_select())
        .first(conn)
        .await?;
    Ok(created)
}

fn diff_between(
    before: &[(&'static str, serde_json::Value)],
    after: &[(&'static str, serde_json::Value)],
) -> Option<serde_json::Value> {
    let fields: Vec<(&str, serde_json::Value, serde_json::Value)> = before
        .iter()
        .zip(after.iter())
        .map(|((name, old), (_, new))| (*name, old.clone(), new.clone()))
        .collect();
    changed_fields_diff(&fields)
}

#[cfg(test)]
mod tests {
    //! Diff plumbing for the update paths.
    use super::diff_between;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    fn diff_between_reports_changed_columns_only() {
        let before = [("active", json!(true)), ("rtl", json!(false))];
        let after = [("active", json!(false)), ("rtl", json!(false))];
        let diff = diff_between(&before, &after).expect("one change");
        assert_eq!(
            diff,
            json!({ "before": { "active": true }, "after": { "active": false } })
        );
    }

    #[rstest]
    fn diff_between_identical_rows_is_none() {
        let fields = [("code", json!("en"))];
        assert!(diff_between(&fields, &fields).is_none());
    }
}
