//! OpenAPI surface used by Swagger UI and tooling.

use utoipa::OpenApi;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};

use crate::inbound::http::{admin, catalog, health, languages, localize};

/// Aggregated OpenAPI document for the public and admin surfaces.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Lexicon Localization Catalog Service",
        description = "Versioned, checksum-stamped per-language catalogs with \
                       fallback-resolved key lookups and an audited admin surface.",
    ),
    paths(
        health::health,
        languages::list_languages,
        catalog::get_catalog,
        localize::localize_key,
        localize::localize_batch,
        admin::create_language,
        admin::update_language,
        admin::delete_language,
        admin::create_key,
        admin::list_keys,
        admin::update_key,
        admin::delete_key,
        admin::create_localization,
        admin::update_localization,
        admin::delete_localization,
        admin::approve_localization,
        admin::invalidate_cache,
        admin::list_audit,
    ),
    components(schemas(
        health::HealthResponse,
        languages::LanguageDto,
        languages::LanguagesResponse,
        catalog::CatalogResponse,
        localize::LocalizeResponse,
        localize::BatchRequest,
        localize::BatchEntry,
        localize::BatchResponse,
        admin::CreateLanguageBody,
        admin::UpdateLanguageBody,
        admin::CreateKeyBody,
        admin::UpdateKeyBody,
        admin::UpsertLocalizationBody,
        admin::InvalidateBody,
        admin::InvalidateResponse,
        admin::KeyDto,
        admin::KeysResponse,
        admin::LocalizationDto,
        admin::AuditDto,
        admin::AuditResponse,
        crate::inbound::http::error::ErrorBody,
    )),
    modifiers(&BearerToken),
    tags(
        (name = "health", description = "Liveness probes"),
        (name = "languages", description = "Language discovery"),
        (name = "catalog", description = "Whole-catalog reads"),
        (name = "localize", description = "Key and batch lookups"),
        (name = "admin", description = "Audited mutations"),
    )
)]
pub struct ApiDoc;

/// Registers the bearer token security scheme.
struct BearerToken;

impl utoipa::Modify for BearerToken {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "BearerToken",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .build(),
                ),
            );
        }
    }
}
