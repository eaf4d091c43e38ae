//! Catalog read endpoint.
//!
//! ```text
//! GET /v1/catalog/{lang}?category=&if_checksum=
//! ```

use actix_web::{HttpResponse, get, web};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::domain::cache::RequestScope;
use crate::domain::{CatalogFetch, Error, LanguageCode};
use crate::inbound::http::auth::AuthContext;
use crate::inbound::http::error::{ApiResult, ok_envelope, with_deadline};
use crate::inbound::http::state::HttpState;

/// Query parameters for a catalog fetch.
#[derive(Debug, Deserialize, IntoParams)]
pub struct CatalogQuery {
    /// Restrict the catalog to one key category.
    pub category: Option<String>,
    /// Checksum the client already holds; a match yields `304 Not Modified`.
    pub if_checksum: Option<String>,
}

/// Response payload for a catalog fetch.
#[derive(Debug, serde::Serialize, ToSchema)]
pub struct CatalogResponse {
    /// Language code the catalog serves.
    #[schema(example = "en")]
    pub language: String,
    /// Catalog version within its (language, category) sequence.
    #[schema(example = 1)]
    pub version: i32,
    /// SHA-256 checksum of the canonical catalog serialization.
    #[schema(example = "44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a")]
    pub checksum: String,
    /// The `key -> value` mapping, keys in canonical order.
    #[schema(value_type = std::collections::BTreeMap<String, String>)]
    pub catalog: serde_json::Value,
}

/// Fetch a whole per-language catalog, with checksum revalidation.
#[utoipa::path(
    get,
    path = "/v1/catalog/{lang}",
    description = "Return the assembled catalog for a language, wrapped in the response envelope. \
                   Clients cache the body and revalidate with if_checksum.",
    params(
        ("lang" = String, Path, description = "Language short code"),
        CatalogQuery,
    ),
    responses(
        (status = 200, description = "Catalog snapshot", body = CatalogResponse),
        (status = 304, description = "Client checksum still current"),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Unknown or inactive language"),
        (status = 500, description = "Store failure"),
    ),
    tags = ["catalog"],
    operation_id = "getCatalog",
    security(("BearerToken" = []))
)]
#[get("/catalog/{lang}")]
pub async fn get_catalog(
    state: web::Data<HttpState>,
    _auth: AuthContext,
    path: web::Path<String>,
    query: web::Query<CatalogQuery>,
) -> ApiResult<HttpResponse> {
    let language = LanguageCode::new(path.into_inner())
        .map_err(|err| Error::validation(err.to_string()))?;
    let query = query.into_inner();

    let mut scope = RequestScope::new();
    let fetch = with_deadline(
        state.timeouts.catalog,
        "catalog fetch",
        state.catalog.get_catalog(
            &mut scope,
            &language,
            query.category.as_deref(),
            query.if_checksum.as_deref(),
        ),
    )
    .await?;

    match fetch {
        CatalogFetch::NotModified => Ok(HttpResponse::NotModified().finish()),
        CatalogFetch::Full(data) => {
            let catalog = serde_json::to_value(data.mapping())
                .map_err(|err| Error::internal(err.to_string()))?;
            Ok(ok_envelope(CatalogResponse {
                language: data.language().as_str().to_owned(),
                version: data.version(),
                checksum: data.checksum().to_owned(),
                catalog,
            }))
        }
    }
}
