//! Language listing endpoint.
//!
//! ```text
//! GET /v1/languages?active_only=
//! ```

use actix_web::{HttpResponse, get, web};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::Language;
use crate::inbound::http::auth::AuthContext;
use crate::inbound::http::error::{ApiResult, ok_envelope, with_deadline};
use crate::inbound::http::state::HttpState;

/// Query parameters for the language listing.
#[derive(Debug, Deserialize, IntoParams)]
pub struct LanguagesQuery {
    /// Restrict to active languages (default `true`).
    pub active_only: Option<bool>,
}

/// One language on the wire; timestamps are unix seconds.
#[derive(Debug, Serialize, ToSchema)]
pub struct LanguageDto {
    #[schema(example = "en")]
    pub code: String,
    #[schema(example = "English")]
    pub name: String,
    #[schema(example = "English")]
    pub native_name: String,
    pub rtl: bool,
    pub active: bool,
    pub default: bool,
    #[schema(example = 1_735_689_600)]
    pub created: i64,
    #[schema(example = 1_735_689_600)]
    pub modified: i64,
}

impl From<Language> for LanguageDto {
    fn from(language: Language) -> Self {
        Self {
            code: language.code.as_str().to_owned(),
            name: language.display_name,
            native_name: language.native_name,
            rtl: language.rtl,
            active: language.active,
            default: language.default,
            created: language.created_at.timestamp(),
            modified: language.modified_at.timestamp(),
        }
    }
}

/// Response payload for the language listing.
#[derive(Debug, Serialize, ToSchema)]
pub struct LanguagesResponse {
    pub languages: Vec<LanguageDto>,
}

/// List available languages.
#[utoipa::path(
    get,
    path = "/v1/languages",
    params(LanguagesQuery),
    responses(
        (status = 200, description = "Available languages", body = LanguagesResponse),
        (status = 401, description = "Missing or invalid token"),
    ),
    tags = ["languages"],
    operation_id = "listLanguages",
    security(("BearerToken" = []))
)]
#[get("/languages")]
pub async fn list_languages(
    state: web::Data<HttpState>,
    _auth: AuthContext,
    query: web::Query<LanguagesQuery>,
) -> ApiResult<HttpResponse> {
    let active_only = query.into_inner().active_only.unwrap_or(true);
    let languages = with_deadline(
        state.timeouts.lookup,
        "language listing",
        state.catalog.list_languages(active_only),
    )
    .await?;
    Ok(ok_envelope(LanguagesResponse {
        languages: languages.into_iter().map(LanguageDto::from).collect(),
    }))
}
