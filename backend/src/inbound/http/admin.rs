//! Admin mutation endpoints.
//!
//! ```text
//! POST/PUT/DELETE /v1/admin/languages
//! POST/PUT/DELETE /v1/admin/keys
//! POST/PUT/DELETE /v1/admin/localizations
//! POST            /v1/admin/localizations/{id}/approve
//! POST            /v1/admin/cache/invalidate
//! GET             /v1/admin/audit
//! ```
//!
//! Every handler gates on the configured admin role set and threads the
//! caller's identity into the audit trail.

use actix_web::{HttpResponse, delete, get, post, put, web};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::domain::audit::{AuditEntityKind, AuditFilter, AuditRecord};
use crate::domain::key::normalize_category;
use crate::domain::{
    Error, KeyDraft, KeyPath, KeyUpdate, LanguageCode, LanguageDraft, LanguageUpdate,
    Localization, LocalizationKey, LocalizationUpsert, VariableSchema, VariableSpec,
};
use crate::inbound::http::auth::AuthContext;
use crate::inbound::http::error::{ApiResult, created_envelope, ok_envelope, with_deadline};
use crate::inbound::http::languages::LanguageDto;
use crate::inbound::http::state::HttpState;

fn parse_language(raw: &str) -> Result<LanguageCode, Error> {
    LanguageCode::new(raw).map_err(|err| Error::validation(err.to_string()))
}

fn parse_key(raw: &str) -> Result<KeyPath, Error> {
    KeyPath::new(raw).map_err(|err| Error::validation(err.to_string()))
}

// ---------------------------------------------------------------------------
// Wire DTOs
// ---------------------------------------------------------------------------

/// Body for creating a language.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateLanguageBody {
    #[schema(example = "de")]
    pub code: String,
    #[schema(example = "German")]
    pub name: String,
    #[schema(example = "Deutsch")]
    pub native_name: Option<String>,
    pub rtl: Option<bool>,
    pub active: Option<bool>,
    pub default: Option<bool>,
}

/// Body for updating a language; absent fields stay untouched.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateLanguageBody {
    #[schema(example = "de")]
    pub code: String,
    pub name: Option<String>,
    pub native_name: Option<String>,
    pub rtl: Option<bool>,
    pub active: Option<bool>,
    pub default: Option<bool>,
}

/// Query selecting a language by code.
#[derive(Debug, Deserialize, IntoParams)]
pub struct LanguageSelector {
    #[param(example = "de")]
    pub code: String,
}

/// Body for registering a localization key.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateKeyBody {
    #[schema(example = "common.buttons.ok")]
    pub key: String,
    #[schema(example = "buttons")]
    pub category: Option<String>,
    pub description: Option<String>,
    pub usage_context: Option<String>,
}

/// Body for updating a key; an empty `category` clears it.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateKeyBody {
    #[schema(example = "common.buttons.ok")]
    pub key: String,
    pub category: Option<String>,
    pub description: Option<String>,
    pub usage_context: Option<String>,
}

/// Query selecting a key by path.
#[derive(Debug, Deserialize, IntoParams)]
pub struct KeySelector {
    #[param(example = "common.buttons.ok")]
    pub key: String,
}

/// Body for upserting a localization.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpsertLocalizationBody {
    #[schema(example = "common.ok")]
    pub key: String,
    #[schema(example = "de")]
    pub language: String,
    #[schema(example = "OK")]
    pub value: String,
    /// Category applied when the key must be registered.
    pub category: Option<String>,
    /// Opaque plural-forms blob, stored verbatim.
    #[schema(value_type = Option<serde_json::Value>)]
    pub plural_forms: Option<serde_json::Value>,
    /// Ordered placeholder schema.
    #[schema(value_type = Option<Vec<serde_json::Value>>)]
    pub variables: Option<Vec<VariableSpec>>,
    /// Approve in the same operation.
    pub approved: Option<bool>,
}

/// Query selecting a localization by id.
#[derive(Debug, Deserialize, IntoParams)]
pub struct LocalizationSelector {
    pub id: Uuid,
}

/// Body for explicit cache invalidation.
#[derive(Debug, Deserialize, ToSchema)]
pub struct InvalidateBody {
    #[schema(example = "de")]
    pub language: Option<String>,
    #[schema(example = "buttons")]
    pub category: Option<String>,
}

/// Audit listing filters; timestamps are unix seconds.
#[derive(Debug, Deserialize, IntoParams)]
pub struct AuditQuery {
    #[param(example = "localization")]
    pub entity_kind: Option<String>,
    pub entity_id: Option<Uuid>,
    pub actor: Option<String>,
    pub from: Option<i64>,
    pub until: Option<i64>,
    pub limit: Option<i64>,
}

/// A localization key on the wire; timestamps are unix seconds.
#[derive(Debug, Serialize, ToSchema)]
pub struct KeyDto {
    pub id: Uuid,
    #[schema(example = "common.buttons.ok")]
    pub key: String,
    pub category: Option<String>,
    pub description: Option<String>,
    pub usage_context: Option<String>,
    pub created: i64,
    pub modified: i64,
}

impl From<LocalizationKey> for KeyDto {
    fn from(key: LocalizationKey) -> Self {
        Self {
            id: key.id,
            key: key.key.as_str().to_owned(),
            category: key.category,
            description: key.description,
            usage_context: key.usage_context,
            created: key.created_at.timestamp(),
            modified: key.modified_at.timestamp(),
        }
    }
}

/// A localization on the wire; timestamps are unix seconds.
#[derive(Debug, Serialize, ToSchema)]
pub struct LocalizationDto {
    pub id: Uuid,
    pub key_id: Uuid,
    pub language_id: Uuid,
    #[schema(example = "OK")]
    pub value: String,
    #[schema(value_type = Option<serde_json::Value>)]
    pub plural_forms: Option<serde_json::Value>,
    #[schema(value_type = Option<serde_json::Value>)]
    pub variables: Option<VariableSchema>,
    #[schema(example = 1)]
    pub version: i32,
    pub approved: bool,
    pub approved_by: Option<String>,
    pub approved_at: Option<i64>,
    pub created: i64,
    pub modified: i64,
}

impl From<Localization> for LocalizationDto {
    fn from(localization: Localization) -> Self {
        Self {
            id: localization.id,
            key_id: localization.key_id,
            language_id: localization.language_id,
            value: localization.value,
            plural_forms: localization.plural_forms,
            variables: localization.variables,
            version: localization.version,
            approved: localization.approved,
            approved_by: localization.approved_by,
            approved_at: localization.approved_at.map(|at| at.timestamp()),
            created: localization.created_at.timestamp(),
            modified: localization.modified_at.timestamp(),
        }
    }
}

/// An audit record on the wire.
#[derive(Debug, Serialize, ToSchema)]
pub struct AuditDto {
    pub id: Uuid,
    #[schema(example = "update")]
    pub action: String,
    #[schema(example = "localization")]
    pub entity_kind: String,
    pub entity_id: Uuid,
    pub actor: String,
    pub origin: Option<String>,
    pub user_agent: Option<String>,
    #[schema(value_type = Option<serde_json::Value>)]
    pub diff: Option<serde_json::Value>,
    pub created: i64,
}

impl From<AuditRecord> for AuditDto {
    fn from(record: AuditRecord) -> Self {
        Self {
            id: record.id,
            action: record.action.as_str().to_owned(),
            entity_kind: record.entity_kind.as_str().to_owned(),
            entity_id: record.entity_id,
            actor: record.actor,
            origin: record.origin,
            user_agent: record.user_agent,
            diff: record.diff,
            created: record.created_at.timestamp(),
        }
    }
}

// ---------------------------------------------------------------------------
// Languages
// ---------------------------------------------------------------------------

/// Create a language.
#[utoipa::path(
    post,
    path = "/v1/admin/languages",
    request_body = CreateLanguageBody,
    responses(
        (status = 201, description = "Language created", body = LanguageDto),
        (status = 400, description = "Invalid code or name"),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Admin role required"),
        (status = 409, description = "Duplicate code"),
    ),
    tags = ["admin"],
    operation_id = "createLanguage",
    security(("BearerToken" = []))
)]
#[post("/languages")]
pub async fn create_language(
    state: web::Data<HttpState>,
    auth: AuthContext,
    body: web::Json<CreateLanguageBody>,
) -> ApiResult<HttpResponse> {
    auth.require_admin(&state.admin_roles)?;
    let body = body.into_inner();
    let code = parse_language(&body.code)?;
    let draft = LanguageDraft::new(code, body.name, body.native_name.unwrap_or_default())
        .map_err(|err| Error::validation(err.to_string()))?
        .rtl(body.rtl.unwrap_or(false))
        .active(body.active.unwrap_or(true))
        .default_language(body.default.unwrap_or(false));
    let language = with_deadline(
        state.timeouts.admin,
        "language creation",
        state.admin.create_language(draft, auth.audit_context()),
    )
    .await?;
    Ok(created_envelope(LanguageDto::from(language)))
}

/// Update a language.
#[utoipa::path(
    put,
    path = "/v1/admin/languages",
    request_body = UpdateLanguageBody,
    responses(
        (status = 200, description = "Language updated", body = LanguageDto),
        (status = 400, description = "Empty update"),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "Unknown language"),
    ),
    tags = ["admin"],
    operation_id = "updateLanguage",
    security(("BearerToken" = []))
)]
#[put("/languages")]
pub async fn update_language(
    state: web::Data<HttpState>,
    auth: AuthContext,
    body: web::Json<UpdateLanguageBody>,
) -> ApiResult<HttpResponse> {
    auth.require_admin(&state.admin_roles)?;
    let body = body.into_inner();
    let code = parse_language(&body.code)?;
    let update = LanguageUpdate {
        display_name: body.name,
        native_name: body.native_name,
        rtl: body.rtl,
        active: body.active,
        default: body.default,
    };
    let language = with_deadline(
        state.timeouts.admin,
        "language update",
        state
            .admin
            .update_language(&code, update, auth.audit_context()),
    )
    .await?;
    Ok(ok_envelope(LanguageDto::from(language)))
}

/// Soft-delete a language.
#[utoipa::path(
    delete,
    path = "/v1/admin/languages",
    params(LanguageSelector),
    responses(
        (status = 200, description = "Language deleted", body = LanguageDto),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "Unknown language"),
    ),
    tags = ["admin"],
    operation_id = "deleteLanguage",
    security(("BearerToken" = []))
)]
#[delete("/languages")]
pub async fn delete_language(
    state: web::Data<HttpState>,
    auth: AuthContext,
    query: web::Query<LanguageSelector>,
) -> ApiResult<HttpResponse> {
    auth.require_admin(&state.admin_roles)?;
    let code = parse_language(&query.into_inner().code)?;
    let language = with_deadline(
        state.timeouts.admin,
        "language deletion",
        state.admin.delete_language(&code, auth.audit_context()),
    )
    .await?;
    Ok(ok_envelope(LanguageDto::from(language)))
}

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

/// Register a localization key.
#[utoipa::path(
    post,
    path = "/v1/admin/keys",
    request_body = CreateKeyBody,
    responses(
        (status = 201, description = "Key registered", body = KeyDto),
        (status = 400, description = "Malformed key or category"),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Admin role required"),
        (status = 409, description = "Duplicate key"),
    ),
    tags = ["admin"],
    operation_id = "createKey",
    security(("BearerToken" = []))
)]
#[post("/keys")]
pub async fn create_key(
    state: web::Data<HttpState>,
    auth: AuthContext,
    body: web::Json<CreateKeyBody>,
) -> ApiResult<HttpResponse> {
    auth.require_admin(&state.admin_roles)?;
    let body = body.into_inner();
    let path = parse_key(&body.key)?;
    let mut draft = KeyDraft::new(path, body.category)
        .map_err(|err| Error::validation(err.to_string()))?;
    if let Some(description) = body.description {
        draft = draft.description(description);
    }
    if let Some(usage_context) = body.usage_context {
        draft = draft.usage_context(usage_context);
    }
    let key = with_deadline(
        state.timeouts.admin,
        "key registration",
        state.admin.create_key(draft, auth.audit_context()),
    )
    .await?;
    Ok(created_envelope(KeyDto::from(key)))
}

/// Update a localization key.
#[utoipa::path(
    put,
    path = "/v1/admin/keys",
    request_body = UpdateKeyBody,
    responses(
        (status = 200, description = "Key updated", body = KeyDto),
        (status = 400, description = "Empty update"),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "Unknown key"),
    ),
    tags = ["admin"],
    operation_id = "updateKey",
    security(("BearerToken" = []))
)]
#[put("/keys")]
pub async fn update_key(
    state: web::Data<HttpState>,
    auth: AuthContext,
    body: web::Json<UpdateKeyBody>,
) -> ApiResult<HttpResponse> {
    auth.require_admin(&state.admin_roles)?;
    let body = body.into_inner();
    let path = parse_key(&body.key)?;
    let category = body
        .category
        .map(|raw| normalize_category(Some(raw)))
        .transpose()
        .map_err(|err| Error::validation(err.to_string()))?;
    let update = KeyUpdate {
        category,
        description: body.description,
        usage_context: body.usage_context,
    };
    let key = with_deadline(
        state.timeouts.admin,
        "key update",
        state.admin.update_key(&path, update, auth.audit_context()),
    )
    .await?;
    Ok(ok_envelope(KeyDto::from(key)))
}

/// Query selecting keys by category.
#[derive(Debug, Deserialize, IntoParams)]
pub struct KeyListingQuery {
    #[param(example = "buttons")]
    pub category: String,
}

/// Response payload for key listings.
#[derive(Debug, Serialize, ToSchema)]
pub struct KeysResponse {
    pub keys: Vec<KeyDto>,
}

/// List keys in a category.
#[utoipa::path(
    get,
    path = "/v1/admin/keys",
    params(KeyListingQuery),
    responses(
        (status = 200, description = "Keys in the category, ordered by path", body = KeysResponse),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Admin role required"),
    ),
    tags = ["admin"],
    operation_id = "listKeys",
    security(("BearerToken" = []))
)]
#[get("/keys")]
pub async fn list_keys(
    state: web::Data<HttpState>,
    auth: AuthContext,
    query: web::Query<KeyListingQuery>,
) -> ApiResult<HttpResponse> {
    auth.require_admin(&state.admin_roles)?;
    let keys = with_deadline(
        state.timeouts.admin,
        "key listing",
        state.admin.list_keys(&query.into_inner().category),
    )
    .await?;
    Ok(ok_envelope(KeysResponse {
        keys: keys.into_iter().map(KeyDto::from).collect(),
    }))
}

/// Soft-delete a localization key.
#[utoipa::path(
    delete,
    path = "/v1/admin/keys",
    params(KeySelector),
    responses(
        (status = 200, description = "Key deleted", body = KeyDto),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "Unknown key"),
    ),
    tags = ["admin"],
    operation_id = "deleteKey",
    security(("BearerToken" = []))
)]
#[delete("/keys")]
pub async fn delete_key(
    state: web::Data<HttpState>,
    auth: AuthContext,
    query: web::Query<KeySelector>,
) -> ApiResult<HttpResponse> {
    auth.require_admin(&state.admin_roles)?;
    let path = parse_key(&query.into_inner().key)?;
    let key = with_deadline(
        state.timeouts.admin,
        "key deletion",
        state.admin.delete_key(&path, auth.audit_context()),
    )
    .await?;
    Ok(ok_envelope(KeyDto::from(key)))
}

// ---------------------------------------------------------------------------
// Localizations
// ---------------------------------------------------------------------------

async fn upsert(
    state: &HttpState,
    auth: &AuthContext,
    body: UpsertLocalizationBody,
) -> Result<Localization, Error> {
    let key = parse_key(&body.key)?;
    let language = parse_language(&body.language)?;
    let category = normalize_category(body.category)
        .map_err(|err| Error::validation(err.to_string()))?;
    let mut request = LocalizationUpsert::new(key, language, body.value)
        .map_err(|err| Error::validation(err.to_string()))?
        .category(category)
        .approved(body.approved.unwrap_or(false));
    if let Some(plural_forms) = body.plural_forms {
        request = request
            .plural_forms(plural_forms)
            .map_err(|err| Error::validation(err.to_string()))?;
    }
    if let Some(variables) = body.variables {
        let schema =
            VariableSchema::new(variables).map_err(|err| Error::validation(err.to_string()))?;
        request = request.variables(schema);
    }
    with_deadline(
        state.timeouts.admin,
        "localization upsert",
        state
            .admin
            .upsert_localization(request, auth.audit_context()),
    )
    .await
}

/// Create or update a localization.
#[utoipa::path(
    post,
    path = "/v1/admin/localizations",
    request_body = UpsertLocalizationBody,
    responses(
        (status = 201, description = "Localization created", body = LocalizationDto),
        (status = 200, description = "Localization updated", body = LocalizationDto),
        (status = 400, description = "Invalid payload"),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "Unknown language"),
        (status = 409, description = "Concurrent upsert conflict"),
    ),
    tags = ["admin"],
    operation_id = "createLocalization",
    security(("BearerToken" = []))
)]
#[post("/localizations")]
pub async fn create_localization(
    state: web::Data<HttpState>,
    auth: AuthContext,
    body: web::Json<UpsertLocalizationBody>,
) -> ApiResult<HttpResponse> {
    auth.require_admin(&state.admin_roles)?;
    let localization = upsert(&state, &auth, body.into_inner()).await?;
    if localization.version == 1 {
        Ok(created_envelope(LocalizationDto::from(localization)))
    } else {
        Ok(ok_envelope(LocalizationDto::from(localization)))
    }
}

/// Update a localization (alias of the upsert).
#[utoipa::path(
    put,
    path = "/v1/admin/localizations",
    request_body = UpsertLocalizationBody,
    responses(
        (status = 200, description = "Localization upserted", body = LocalizationDto),
        (status = 400, description = "Invalid payload"),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "Unknown language"),
    ),
    tags = ["admin"],
    operation_id = "updateLocalization",
    security(("BearerToken" = []))
)]
#[put("/localizations")]
pub async fn update_localization(
    state: web::Data<HttpState>,
    auth: AuthContext,
    body: web::Json<UpsertLocalizationBody>,
) -> ApiResult<HttpResponse> {
    auth.require_admin(&state.admin_roles)?;
    let localization = upsert(&state, &auth, body.into_inner()).await?;
    Ok(ok_envelope(LocalizationDto::from(localization)))
}

/// Soft-delete a localization.
#[utoipa::path(
    delete,
    path = "/v1/admin/localizations",
    params(LocalizationSelector),
    responses(
        (status = 200, description = "Localization deleted", body = LocalizationDto),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "Unknown localization"),
    ),
    tags = ["admin"],
    operation_id = "deleteLocalization",
    security(("BearerToken" = []))
)]
#[delete("/localizations")]
pub async fn delete_localization(
    state: web::Data<HttpState>,
    auth: AuthContext,
    query: web::Query<LocalizationSelector>,
) -> ApiResult<HttpResponse> {
    auth.require_admin(&state.admin_roles)?;
    let id = query.into_inner().id;
    let localization = with_deadline(
        state.timeouts.admin,
        "localization deletion",
        state.admin.delete_localization(id, auth.audit_context()),
    )
    .await?;
    Ok(ok_envelope(LocalizationDto::from(localization)))
}

/// Approve a localization for catalog inclusion.
#[utoipa::path(
    post,
    path = "/v1/admin/localizations/{id}/approve",
    params(("id" = Uuid, Path, description = "Localization id")),
    responses(
        (status = 200, description = "Localization approved", body = LocalizationDto),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "Unknown localization"),
    ),
    tags = ["admin"],
    operation_id = "approveLocalization",
    security(("BearerToken" = []))
)]
#[post("/localizations/{id}/approve")]
pub async fn approve_localization(
    state: web::Data<HttpState>,
    auth: AuthContext,
    path: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    auth.require_admin(&state.admin_roles)?;
    let id = path.into_inner();
    let localization = with_deadline(
        state.timeouts.admin,
        "localization approval",
        state.admin.approve_localization(id, auth.audit_context()),
    )
    .await?;
    Ok(ok_envelope(LocalizationDto::from(localization)))
}

// ---------------------------------------------------------------------------
// Cache & audit
// ---------------------------------------------------------------------------

/// Response payload for cache invalidation.
#[derive(Debug, Serialize, ToSchema)]
pub struct InvalidateResponse {
    /// Glob patterns that were applied.
    pub patterns: Vec<String>,
}

/// Invalidate cached catalogs explicitly.
#[utoipa::path(
    post,
    path = "/v1/admin/cache/invalidate",
    request_body = InvalidateBody,
    responses(
        (status = 200, description = "Patterns applied", body = InvalidateResponse),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Admin role required"),
    ),
    tags = ["admin"],
    operation_id = "invalidateCache",
    security(("BearerToken" = []))
)]
#[post("/cache/invalidate")]
pub async fn invalidate_cache(
    state: web::Data<HttpState>,
    auth: AuthContext,
    body: web::Json<InvalidateBody>,
) -> ApiResult<HttpResponse> {
    auth.require_admin(&state.admin_roles)?;
    let body = body.into_inner();
    let language = body.language.as_deref().map(parse_language).transpose()?;
    let patterns = with_deadline(
        state.timeouts.admin,
        "cache invalidation",
        state.admin.invalidate_cache(
            language.as_ref(),
            body.category.as_deref(),
            auth.audit_context(),
        ),
    )
    .await?;
    Ok(ok_envelope(InvalidateResponse { patterns }))
}

/// Response payload for audit reads.
#[derive(Debug, Serialize, ToSchema)]
pub struct AuditResponse {
    pub records: Vec<AuditDto>,
}

/// Read the audit trail.
#[utoipa::path(
    get,
    path = "/v1/admin/audit",
    params(AuditQuery),
    responses(
        (status = 200, description = "Matching audit records, newest first", body = AuditResponse),
        (status = 400, description = "Unknown entity kind"),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Admin role required"),
    ),
    tags = ["admin"],
    operation_id = "listAudit",
    security(("BearerToken" = []))
)]
#[get("/audit")]
pub async fn list_audit(
    state: web::Data<HttpState>,
    auth: AuthContext,
    query: web::Query<AuditQuery>,
) -> ApiResult<HttpResponse> {
    auth.require_admin(&state.admin_roles)?;
    let query = query.into_inner();
    let entity_kind = query
        .entity_kind
        .as_deref()
        .map(|raw| {
            AuditEntityKind::parse(raw)
                .ok_or_else(|| Error::validation(format!("unknown entity kind '{raw}'")))
        })
        .transpose()?;
    let filter = AuditFilter {
        entity_kind,
        entity_id: query.entity_id,
        actor: query.actor,
        from: query.from.map(timestamp_to_datetime).transpose()?,
        until: query.until.map(timestamp_to_datetime).transpose()?,
        limit: query.limit,
    };
    let records = with_deadline(
        state.timeouts.admin,
        "audit listing",
        state.admin.list_audit(filter),
    )
    .await?;
    Ok(ok_envelope(AuditResponse {
        records: records.into_iter().map(AuditDto::from).collect(),
    }))
}

fn timestamp_to_datetime(seconds: i64) -> Result<DateTime<Utc>, Error> {
    DateTime::<Utc>::from_timestamp(seconds, 0)
        .ok_or_else(|| Error::validation(format!("timestamp {seconds} out of range")))
}
