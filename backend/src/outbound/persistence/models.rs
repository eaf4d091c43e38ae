//! Row models bridging Diesel and the domain aggregates.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::domain::audit::{AuditAction, AuditEntityKind, AuditRecord};
use crate::domain::key::{KeyPath, LocalizationKey};
use crate::domain::language::{Language, LanguageCode};
use crate::domain::localization::{Localization, VariableSchema};
use crate::domain::ports::PendingInvalidation;
use crate::domain::snapshot::CatalogSnapshot;

use super::schema::{
    languages, localization_audit_log, localization_cache_keys, localization_catalogs,
    localization_keys, localizations,
};

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = languages)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct LanguageRow {
    pub id: Uuid,
    pub code: String,
    pub display_name: String,
    pub native_name: String,
    pub rtl: bool,
    pub active: bool,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub deleted: bool,
}

impl LanguageRow {
    /// Convert a row into the domain aggregate.
    pub fn into_domain(self) -> Result<Language, String> {
        let code = LanguageCode::new(self.code).map_err(|e| e.to_string())?;
        Ok(Language {
            id: self.id,
            code,
            display_name: self.display_name,
            native_name: self.native_name,
            rtl: self.rtl,
            active: self.active,
            default: self.is_default,
            created_at: self.created_at,
            modified_at: self.modified_at,
            deleted: self.deleted,
        })
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = languages)]
pub struct NewLanguageRow {
    pub id: Uuid,
    pub code: String,
    pub display_name: String,
    pub native_name: String,
    pub rtl: bool,
    pub active: bool,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub deleted: bool,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = localization_keys)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct KeyRow {
    pub id: Uuid,
    pub key: String,
    pub category: Option<String>,
    pub description: Option<String>,
    pub usage_context: Option<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub deleted: bool,
}

impl KeyRow {
    /// Convert a row into the domain aggregate.
    pub fn into_domain(self) -> Result<LocalizationKey, String> {
        let key = KeyPath::new(self.key).map_err(|e| e.to_string())?;
        Ok(LocalizationKey {
            id: self.id,
            key,
            category: self.category,
            description: self.description,
            usage_context: self.usage_context,
            created_at: self.created_at,
            modified_at: self.modified_at,
            deleted: self.deleted,
        })
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = localization_keys)]
pub struct NewKeyRow {
    pub id: Uuid,
    pub key: String,
    pub category: Option<String>,
    pub description: Option<String>,
    pub usage_context: Option<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub deleted: bool,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = localizations)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct LocalizationRow {
    pub id: Uuid,
    pub key_id: Uuid,
    pub language_id: Uuid,
    pub value: String,
    pub plural_forms: Option<serde_json::Value>,
    pub variables: Option<serde_json::Value>,
    pub version: i32,
    pub approved: bool,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub deleted: bool,
}

impl LocalizationRow {
    /// Convert a row into the domain aggregate.
    pub fn into_domain(self) -> Result<Localization, String> {
        let variables = self
            .variables
            .map(json_to_variable_schema)
            .transpose()?;
        Ok(Localization {
            id: self.id,
            key_id: self.key_id,
            language_id: self.language_id,
            value: self.value,
            plural_forms: self.plural_forms,
            variables,
            version: self.version,
            approved: self.approved,
            approved_by: self.approved_by,
            approved_at: self.approved_at,
            created_at: self.created_at,
            modified_at: self.modified_at,
            deleted: self.deleted,
        })
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = localizations)]
pub struct NewLocalizationRow {
    pub id: Uuid,
    pub key_id: Uuid,
    pub language_id: Uuid,
    pub value: String,
    pub plural_forms: Option<serde_json::Value>,
    pub variables: Option<serde_json::Value>,
    pub version: i32,
    pub approved: bool,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub deleted: bool,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = localization_catalogs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CatalogRow {
    pub id: Uuid,
    pub language_id: Uuid,
    pub category: Option<String>,
    pub catalog_version: i32,
    pub checksum: String,
    pub catalog: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl CatalogRow {
    /// Convert a row into the domain snapshot, resolving the language code.
    pub fn into_domain(self, language: LanguageCode) -> Result<CatalogSnapshot, String> {
        let entries = serde_json::from_value(self.catalog)
            .map_err(|e| format!("catalog column is not a string map: {e}"))?;
        let checksum = crate::domain::Checksum::parse_hex(self.checksum.trim())
            .map_err(|e| format!("checksum column malformed: {e}"))?;
        Ok(CatalogSnapshot {
            id: self.id,
            language_id: self.language_id,
            language,
            category: self.category,
            entries,
            version: self.catalog_version,
            checksum,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = localization_catalogs)]
pub struct NewCatalogRow {
    pub id: Uuid,
    pub language_id: Uuid,
    pub category: Option<String>,
    pub catalog_version: i32,
    pub checksum: String,
    pub catalog: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = localization_cache_keys)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CacheKeyRow {
    pub id: Uuid,
    pub pattern: String,
    pub attempts: i32,
    pub next_attempt_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<CacheKeyRow> for PendingInvalidation {
    fn from(row: CacheKeyRow) -> Self {
        Self {
            id: row.id,
            pattern: row.pattern,
            attempts: row.attempts,
            next_attempt_at: row.next_attempt_at,
        }
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = localization_cache_keys)]
pub struct NewCacheKeyRow {
    pub id: Uuid,
    pub pattern: String,
    pub attempts: i32,
    pub next_attempt_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = localization_audit_log)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct AuditRow {
    pub id: Uuid,
    pub action: String,
    pub entity_kind: String,
    pub entity_id: Uuid,
    pub actor: String,
    pub origin: Option<String>,
    pub user_agent: Option<String>,
    pub diff: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl AuditRow {
    /// Convert a row into the domain record.
    pub fn into_domain(self) -> Result<AuditRecord, String> {
        let action = AuditAction::parse(&self.action)
            .ok_or_else(|| format!("unknown audit action '{}'", self.action))?;
        let entity_kind = AuditEntityKind::parse(&self.entity_kind)
            .ok_or_else(|| format!("unknown audit entity kind '{}'", self.entity_kind))?;
        Ok(AuditRecord {
            id: self.id,
            action,
            entity_kind,
            entity_id: self.entity_id,
            actor: self.actor,
            origin: self.origin,
            user_agent: self.user_agent,
            diff: self.diff,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = localization_audit_log)]
pub struct NewAuditRow {
    pub id: Uuid,
    pub action: String,
    pub entity_kind: String,
    pub entity_id: Uuid,
    pub actor: String,
    pub origin: Option<String>,
    pub user_agent: Option<String>,
    pub diff: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl NewAuditRow {
    /// Build an insertable row from a domain record.
    pub fn from_domain(record: AuditRecord) -> Self {
        Self {
            id: record.id,
            action: record.action.as_str().to_owned(),
            entity_kind: record.entity_kind.as_str().to_owned(),
            entity_id: record.entity_id,
            actor: record.actor,
            origin: record.origin,
            user_agent: record.user_agent,
            diff: record.diff,
            created_at: record.created_at,
        }
    }
}

/// Decode a JSONB variables column into the domain schema.
pub fn json_to_variable_schema(value: serde_json::Value) -> Result<VariableSchema, String> {
    serde_json::from_value(value).map_err(|e| format!("variables column malformed: {e}"))
}

/// Encode a domain schema for the JSONB variables column.
pub fn variable_schema_to_json(schema: &VariableSchema) -> Result<serde_json::Value, String> {
    serde_json::to_value(schema).map_err(|e| format!("variables not serializable: {e}"))
}
