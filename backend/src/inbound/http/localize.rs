//! Single-key and batch lookup endpoints.
//!
//! ```text
//! GET  /v1/localize/{key}?language=&fallback=
//! POST /v1/localize/batch
//! ```

use actix_web::{HttpResponse, get, post, web};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::cache::RequestScope;
use crate::domain::{Error, KeyPath, LanguageCode, ResolutionStatus, VariableSchema};
use crate::inbound::http::auth::AuthContext;
use crate::inbound::http::error::{ApiResult, ok_envelope, with_deadline};
use crate::inbound::http::state::HttpState;

/// Largest accepted batch.
const MAX_BATCH_KEYS: usize = 500;

/// Query parameters for a single-key lookup.
#[derive(Debug, Deserialize, IntoParams)]
pub struct LocalizeQuery {
    /// Target language code.
    pub language: String,
    /// Fall back to the default language when the key is missing
    /// (default `true`).
    pub fallback: Option<bool>,
}

/// Response payload for a single-key lookup.
#[derive(Debug, Serialize, ToSchema)]
pub struct LocalizeResponse {
    /// The requested key.
    #[schema(example = "common.ok")]
    pub key: String,
    /// Language the value came from; differs from the request language when
    /// fallback applied.
    #[schema(example = "en")]
    pub language: String,
    /// The translated value, placeholders untouched.
    #[schema(example = "OK")]
    pub value: String,
    /// Ordered placeholder schema for client-side interpolation.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<serde_json::Value>)]
    pub variables: Option<VariableSchema>,
    /// Catalogs only carry approved entries.
    pub approved: bool,
}

/// Request body for a batch lookup.
#[derive(Debug, Deserialize, ToSchema)]
pub struct BatchRequest {
    /// Keys to resolve, order preserved in the response.
    pub keys: Vec<String>,
    /// Target language code.
    pub language: String,
    /// Fall back to the default language (default `true`).
    pub fallback: Option<bool>,
}

/// One entry of the batch response.
#[derive(Debug, Serialize, ToSchema)]
pub struct BatchEntry {
    /// Resolution outcome: `present`, `fallback`, or `missing`.
    #[schema(value_type = String, example = "present")]
    pub status: ResolutionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Source language of the value, when resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<serde_json::Value>)]
    pub variables: Option<VariableSchema>,
}

/// Response payload for a batch lookup.
#[derive(Debug, Serialize, ToSchema)]
pub struct BatchResponse {
    /// Language the batch was requested for.
    #[schema(example = "de")]
    pub language: String,
    /// Per-key results in request order.
    #[schema(value_type = serde_json::Value)]
    pub localizations: serde_json::Map<String, serde_json::Value>,
}

fn parse_language(raw: &str) -> Result<LanguageCode, Error> {
    LanguageCode::new(raw).map_err(|err| Error::validation(err.to_string()))
}

/// Resolve one key with default-language fallback.
#[utoipa::path(
    get,
    path = "/v1/localize/{key}",
    params(
        ("key" = String, Path, description = "Dotted localization key"),
        LocalizeQuery,
    ),
    responses(
        (status = 200, description = "Resolved value", body = LocalizeResponse),
        (status = 400, description = "Malformed key or language"),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Key not found"),
    ),
    tags = ["localize"],
    operation_id = "localizeKey",
    security(("BearerToken" = []))
)]
#[get("/localize/{key}")]
pub async fn localize_key(
    state: web::Data<HttpState>,
    _auth: AuthContext,
    path: web::Path<String>,
    query: web::Query<LocalizeQuery>,
) -> ApiResult<HttpResponse> {
    let key = KeyPath::new(path.into_inner())
        .map_err(|err| Error::validation(err.to_string()))?;
    let query = query.into_inner();
    let language = parse_language(&query.language)?;
    let fallback = query.fallback.unwrap_or(true);

    let mut scope = RequestScope::new();
    let resolved = with_deadline(
        state.timeouts.lookup,
        "key lookup",
        state
            .catalog
            .get_key(&mut scope, key.as_str(), &language, fallback),
    )
    .await?;

    Ok(ok_envelope(LocalizeResponse {
        key: key.as_str().to_owned(),
        language: resolved.language.as_str().to_owned(),
        value: resolved.value,
        variables: resolved.variables,
        approved: true,
    }))
}

/// Resolve a batch of keys against one snapshot acquisition.
#[utoipa::path(
    post,
    path = "/v1/localize/batch",
    request_body = BatchRequest,
    responses(
        (status = 200, description = "Per-key results in request order", body = BatchResponse),
        (status = 400, description = "Empty or oversized batch"),
        (status = 401, description = "Missing or invalid token"),
    ),
    tags = ["localize"],
    operation_id = "localizeBatch",
    security(("BearerToken" = []))
)]
#[post("/localize/batch")]
pub async fn localize_batch(
    state: web::Data<HttpState>,
    _auth: AuthContext,
    body: web::Json<BatchRequest>,
) -> ApiResult<HttpResponse> {
    let body = body.into_inner();
    if body.keys.is_empty() {
        return Err(Error::validation("batch must name at least one key"));
    }
    if body.keys.len() > MAX_BATCH_KEYS {
        return Err(Error::validation(format!(
            "batch must not exceed {MAX_BATCH_KEYS} keys"
        )));
    }
    let language = parse_language(&body.language)?;
    let fallback = body.fallback.unwrap_or(true);

    let mut scope = RequestScope::new();
    let batch = with_deadline(
        state.timeouts.lookup,
        "batch lookup",
        state
            .catalog
            .get_batch(&mut scope, &body.keys, &language, fallback),
    )
    .await?;

    let mut localizations = serde_json::Map::new();
    for (key, resolved) in batch.resolved {
        let entry = match resolved {
            Some(resolved) => BatchEntry {
                status: resolved.status,
                value: Some(resolved.value),
                language: Some(resolved.language.as_str().to_owned()),
                variables: resolved.variables,
            },
            None => BatchEntry {
                status: ResolutionStatus::Missing,
                value: None,
                language: None,
                variables: None,
            },
        };
        let entry = serde_json::to_value(entry)
            .map_err(|err| Error::internal(err.to_string()))?;
        localizations.insert(key, entry);
    }

    Ok(ok_envelope(BatchResponse {
        language: batch.language.as_str().to_owned(),
        localizations,
    }))
}
