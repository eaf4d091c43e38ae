//! Endpoint-level coverage: envelopes, auth gating, checksum revalidation,
//! and batch ordering over the wire.

mod support;

use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::{test, web};
use lexicon_backend::domain::ports::TokenVerifier;
use lexicon_backend::inbound::http::state::{HttpState, Timeouts};
use lexicon_backend::outbound::auth::HmacTokenVerifier;
use lexicon_backend::server::build_app;
use support::{harness, seed_language, seed_localization};

const SECRET: &str = "http-api-test-secret";

fn state_for(harness: &support::Harness) -> HttpState {
    let verifier = HmacTokenVerifier::new(SECRET);
    HttpState::new(
        Arc::clone(&harness.catalog),
        Arc::clone(&harness.admin),
        Arc::new(verifier) as Arc<dyn TokenVerifier>,
        ["admin".to_owned()].into_iter().collect(),
        Timeouts::default(),
    )
}

fn admin_token() -> String {
    HmacTokenVerifier::new(SECRET).issue("ops@example.com", vec!["admin".to_owned()], None)
}

fn viewer_token() -> String {
    HmacTokenVerifier::new(SECRET).issue("app@example.com", vec!["viewer".to_owned()], None)
}

fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {token}"))
}

#[actix_web::test]
async fn missing_token_is_unauthorized() {
    let harness = harness();
    let app = test::init_service(build_app(web::Data::new(state_for(&harness)))).await;

    let response =
        test::call_service(&app, test::TestRequest::get().uri("/v1/languages").to_request())
            .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = test::read_body_json(response).await;
    assert_eq!(body["success"], serde_json::json!(false));
    assert_eq!(body["error"]["code"], serde_json::json!(3000));
}

#[actix_web::test]
async fn non_admin_token_is_forbidden_on_admin_surface() {
    let harness = harness();
    let app = test::init_service(build_app(web::Data::new(state_for(&harness)))).await;

    let request = test::TestRequest::post()
        .uri("/v1/admin/languages")
        .insert_header(bearer(&viewer_token()))
        .set_json(serde_json::json!({ "code": "de", "name": "German" }))
        .to_request();
    let response = test::call_service(&app, request).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body: serde_json::Value = test::read_body_json(response).await;
    assert_eq!(body["error"]["code"], serde_json::json!(3001));
}

#[actix_web::test]
async fn duplicate_language_code_conflicts() {
    let harness = harness();
    let app = test::init_service(build_app(web::Data::new(state_for(&harness)))).await;
    let payload = serde_json::json!({ "code": "de", "name": "German" });

    let created = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/v1/admin/languages")
            .insert_header(bearer(&admin_token()))
            .set_json(payload.clone())
            .to_request(),
    )
    .await;
    assert_eq!(created.status(), StatusCode::CREATED);

    let duplicate = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/v1/admin/languages")
            .insert_header(bearer(&admin_token()))
            .set_json(payload)
            .to_request(),
    )
    .await;
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);
    let body: serde_json::Value = test::read_body_json(duplicate).await;
    assert_eq!(body["error"]["code"], serde_json::json!(1002));
}

#[actix_web::test]
async fn catalog_fetch_carries_the_envelope_and_revalidates() {
    let harness = harness();
    seed_language(&harness, "en", "English", true).await;
    seed_localization(&harness, "common.ok", "en", "OK").await;
    let app = test::init_service(build_app(web::Data::new(state_for(&harness)))).await;

    let response = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/v1/catalog/en")
            .insert_header(bearer(&viewer_token()))
            .to_request(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = test::read_body_json(response).await;
    assert_eq!(body["success"], serde_json::json!(true));
    assert_eq!(body["data"]["language"], serde_json::json!("en"));
    assert_eq!(body["data"]["version"], serde_json::json!(1));
    assert_eq!(
        body["data"]["checksum"],
        serde_json::json!("93b0e634c45aa0f3e9cb61cb351df928bd96a52e084e5c2909e5c06bffb6f7d1")
    );
    assert_eq!(
        body["data"]["catalog"],
        serde_json::json!({ "common.ok": "OK" })
    );

    let checksum = body["data"]["checksum"].as_str().expect("checksum string");
    let revalidated = test::call_service(
        &app,
        test::TestRequest::get()
            .uri(&format!("/v1/catalog/en?if_checksum={checksum}"))
            .insert_header(bearer(&viewer_token()))
            .to_request(),
    )
    .await;
    assert_eq!(revalidated.status(), StatusCode::NOT_MODIFIED);
    let body = test::read_body(revalidated).await;
    assert!(body.is_empty(), "304 carries no body");
}

#[actix_web::test]
async fn unknown_language_is_not_found() {
    let harness = harness();
    let app = test::init_service(build_app(web::Data::new(state_for(&harness)))).await;

    let response = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/v1/catalog/xx")
            .insert_header(bearer(&viewer_token()))
            .to_request(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: serde_json::Value = test::read_body_json(response).await;
    assert_eq!(body["error"]["code"], serde_json::json!(1001));
}

#[actix_web::test]
async fn localize_reports_the_fallback_source_language() {
    let harness = harness();
    seed_language(&harness, "en", "English", true).await;
    seed_language(&harness, "de", "German", false).await;
    seed_localization(&harness, "common.ok", "en", "OK").await;
    let app = test::init_service(build_app(web::Data::new(state_for(&harness)))).await;

    let response = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/v1/localize/common.ok?language=de&fallback=true")
            .insert_header(bearer(&viewer_token()))
            .to_request(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = test::read_body_json(response).await;
    assert_eq!(body["data"]["value"], serde_json::json!("OK"));
    assert_eq!(body["data"]["language"], serde_json::json!("en"));
    assert_eq!(body["data"]["approved"], serde_json::json!(true));

    let without_fallback = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/v1/localize/common.ok?language=de&fallback=false")
            .insert_header(bearer(&viewer_token()))
            .to_request(),
    )
    .await;
    assert_eq!(without_fallback.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn batch_response_preserves_request_order() {
    let harness = harness();
    seed_language(&harness, "en", "English", true).await;
    seed_localization(&harness, "zebra.last", "en", "Z").await;
    seed_localization(&harness, "alpha.first", "en", "A").await;
    let app = test::init_service(build_app(web::Data::new(state_for(&harness)))).await;

    let request = test::TestRequest::post()
        .uri("/v1/localize/batch")
        .insert_header(bearer(&viewer_token()))
        .set_json(serde_json::json!({
            "keys": ["zebra.last", "missing.key", "alpha.first"],
            "language": "en",
        }))
        .to_request();
    let response = test::call_service(&app, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = test::read_body_json(response).await;

    let localizations = body["data"]["localizations"]
        .as_object()
        .expect("localizations object");
    let order: Vec<&str> = localizations.keys().map(String::as_str).collect();
    assert_eq!(order, vec!["zebra.last", "missing.key", "alpha.first"]);
    assert_eq!(
        localizations["missing.key"]["status"],
        serde_json::json!("missing")
    );
    assert_eq!(
        localizations["zebra.last"]["status"],
        serde_json::json!("present")
    );
}

#[actix_web::test]
async fn empty_batch_is_a_validation_error() {
    let harness = harness();
    let app = test::init_service(build_app(web::Data::new(state_for(&harness)))).await;

    let request = test::TestRequest::post()
        .uri("/v1/localize/batch")
        .insert_header(bearer(&viewer_token()))
        .set_json(serde_json::json!({ "keys": [], "language": "en" }))
        .to_request();
    let response = test::call_service(&app, request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = test::read_body_json(response).await;
    assert_eq!(body["error"]["code"], serde_json::json!(1000));
}

#[actix_web::test]
async fn health_needs_no_token_and_reports_components() {
    let harness = harness();
    let app = test::init_service(build_app(web::Data::new(state_for(&harness)))).await;

    let response =
        test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = test::read_body_json(response).await;
    assert_eq!(body["status"], serde_json::json!("ok"));
    assert_eq!(body["store"], serde_json::json!("up"));
    assert_eq!(body["distributed_cache"], serde_json::json!("disabled"));
}

#[actix_web::test]
async fn store_outage_degrades_health_but_not_the_probe() {
    let harness = harness();
    harness.store.set_ping_failure(true);
    let app = test::init_service(build_app(web::Data::new(state_for(&harness)))).await;

    let response =
        test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = test::read_body_json(response).await;
    assert_eq!(body["status"], serde_json::json!("degraded"));
    assert_eq!(body["store"], serde_json::json!("down"));
}

#[actix_web::test]
async fn key_management_round_trip() {
    let harness = harness();
    let app = test::init_service(build_app(web::Data::new(state_for(&harness)))).await;

    let created = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/v1/admin/keys")
            .insert_header(bearer(&admin_token()))
            .set_json(serde_json::json!({
                "key": "buttons.ok",
                "category": "buttons",
                "description": "Primary confirmation button",
            }))
            .to_request(),
    )
    .await;
    assert_eq!(created.status(), StatusCode::CREATED);

    let listed = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/v1/admin/keys?category=buttons")
            .insert_header(bearer(&admin_token()))
            .to_request(),
    )
    .await;
    assert_eq!(listed.status(), StatusCode::OK);
    let body: serde_json::Value = test::read_body_json(listed).await;
    assert_eq!(body["data"]["keys"][0]["key"], serde_json::json!("buttons.ok"));

    let moved = test::call_service(
        &app,
        test::TestRequest::put()
            .uri("/v1/admin/keys")
            .insert_header(bearer(&admin_token()))
            .set_json(serde_json::json!({ "key": "buttons.ok", "category": "dialogs" }))
            .to_request(),
    )
    .await;
    assert_eq!(moved.status(), StatusCode::OK);

    let deleted = test::call_service(
        &app,
        test::TestRequest::delete()
            .uri("/v1/admin/keys?key=buttons.ok")
            .insert_header(bearer(&admin_token()))
            .to_request(),
    )
    .await;
    assert_eq!(deleted.status(), StatusCode::OK);

    let relisted = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/v1/admin/keys?category=dialogs")
            .insert_header(bearer(&admin_token()))
            .to_request(),
    )
    .await;
    let body: serde_json::Value = test::read_body_json(relisted).await;
    assert_eq!(
        body["data"]["keys"],
        serde_json::json!([]),
        "soft-deleted key no longer listed"
    );
}

#[actix_web::test]
async fn approve_flow_makes_a_draft_visible() {
    let harness = harness();
    seed_language(&harness, "en", "English", true).await;
    let app = test::init_service(build_app(web::Data::new(state_for(&harness)))).await;

    let created = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/v1/admin/localizations")
            .insert_header(bearer(&admin_token()))
            .set_json(serde_json::json!({
                "key": "common.draft",
                "language": "en",
                "value": "Draft",
            }))
            .to_request(),
    )
    .await;
    assert_eq!(created.status(), StatusCode::CREATED);
    let body: serde_json::Value = test::read_body_json(created).await;
    let id = body["data"]["id"].as_str().expect("localization id").to_owned();
    assert_eq!(body["data"]["approved"], serde_json::json!(false));

    // Invisible until approved.
    let catalog = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/v1/catalog/en")
            .insert_header(bearer(&viewer_token()))
            .to_request(),
    )
    .await;
    let catalog_body: serde_json::Value = test::read_body_json(catalog).await;
    assert_eq!(catalog_body["data"]["catalog"], serde_json::json!({}));

    let approved = test::call_service(
        &app,
        test::TestRequest::post()
            .uri(&format!("/v1/admin/localizations/{id}/approve"))
            .insert_header(bearer(&admin_token()))
            .to_request(),
    )
    .await;
    assert_eq!(approved.status(), StatusCode::OK);
    let approved_body: serde_json::Value = test::read_body_json(approved).await;
    assert_eq!(approved_body["data"]["approved"], serde_json::json!(true));
    assert_eq!(
        approved_body["data"]["approved_by"],
        serde_json::json!("ops@example.com")
    );

    let catalog = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/v1/catalog/en")
            .insert_header(bearer(&viewer_token()))
            .to_request(),
    )
    .await;
    let catalog_body: serde_json::Value = test::read_body_json(catalog).await;
    assert_eq!(
        catalog_body["data"]["catalog"],
        serde_json::json!({ "common.draft": "Draft" })
    );
}
