//! Key and batch lookup flows: fallback resolution and ordering.

mod support;

use lexicon_backend::domain::cache::RequestScope;
use lexicon_backend::domain::{ErrorCode, ResolutionStatus};
use support::{harness, lang, seed_language, seed_localization};

#[tokio::test]
async fn missing_target_falls_back_to_the_default_language() {
    let harness = harness();
    seed_language(&harness, "en", "English", true).await;
    seed_language(&harness, "de", "German", false).await;
    seed_localization(&harness, "common.ok", "en", "OK").await;

    let mut scope = RequestScope::new();
    let resolved = harness
        .catalog
        .get_key(&mut scope, "common.ok", &lang("de"), true)
        .await
        .expect("fallback resolves");
    assert_eq!(resolved.value, "OK");
    assert_eq!(
        resolved.language.as_str(),
        "en",
        "response names the fallback source language"
    );
    assert_eq!(resolved.status, ResolutionStatus::Fallback);
}

#[tokio::test]
async fn fallback_disabled_yields_not_found() {
    let harness = harness();
    seed_language(&harness, "en", "English", true).await;
    seed_language(&harness, "de", "German", false).await;
    seed_localization(&harness, "common.ok", "en", "OK").await;

    let mut scope = RequestScope::new();
    let err = harness
        .catalog
        .get_key(&mut scope, "common.ok", &lang("de"), false)
        .await
        .expect_err("missing without fallback");
    assert_eq!(err.code(), ErrorCode::NotFound);
}

#[tokio::test]
async fn deleted_target_localization_falls_back() {
    let harness = harness();
    seed_language(&harness, "en", "English", true).await;
    seed_language(&harness, "de", "German", false).await;
    seed_localization(&harness, "common.ok", "en", "OK").await;
    let german = seed_localization(&harness, "common.ok", "de", "OK (DE)").await;

    harness
        .admin
        .delete_localization(german.id, support::admin_ctx())
        .await
        .expect("deletion succeeds");

    let mut scope = RequestScope::new();
    let resolved = harness
        .catalog
        .get_key(&mut scope, "common.ok", &lang("de"), true)
        .await
        .expect("fallback resolves after deletion");
    assert_eq!(resolved.value, "OK");
    assert_eq!(resolved.language.as_str(), "en");
}

#[tokio::test]
async fn batch_preserves_order_and_reports_per_key_status() {
    let harness = harness();
    seed_language(&harness, "en", "English", true).await;
    seed_language(&harness, "de", "German", false).await;
    seed_localization(&harness, "common.ok", "en", "OK").await;
    seed_localization(&harness, "common.cancel", "de", "Abbrechen").await;

    let keys = vec![
        "common.cancel".to_owned(),
        "common.missing".to_owned(),
        "common.ok".to_owned(),
    ];
    let mut scope = RequestScope::new();
    let batch = harness
        .catalog
        .get_batch(&mut scope, &keys, &lang("de"), true)
        .await
        .expect("batch resolves");

    assert_eq!(batch.language.as_str(), "de");
    let order: Vec<&str> = batch
        .resolved
        .iter()
        .map(|(key, _)| key.as_str())
        .collect();
    assert_eq!(order, vec!["common.cancel", "common.missing", "common.ok"]);

    let statuses: Vec<Option<ResolutionStatus>> = batch
        .resolved
        .iter()
        .map(|(_, resolved)| resolved.as_ref().map(|r| r.status))
        .collect();
    assert_eq!(
        statuses,
        vec![
            Some(ResolutionStatus::Present),
            None,
            Some(ResolutionStatus::Fallback),
        ]
    );
}

#[tokio::test]
async fn batch_acquires_each_catalog_once() {
    let harness = harness();
    seed_language(&harness, "en", "English", true).await;
    seed_language(&harness, "de", "German", false).await;
    seed_localization(&harness, "common.ok", "en", "OK").await;

    let keys: Vec<String> = (0..50).map(|i| format!("key.{i}")).collect();
    let calls_before = harness.store.read_approved_calls();
    let mut scope = RequestScope::new();
    let _ = harness
        .catalog
        .get_batch(&mut scope, &keys, &lang("de"), true)
        .await
        .expect("batch resolves");
    assert_eq!(
        harness.store.read_approved_calls() - calls_before,
        2,
        "one build for the target, one for the fallback catalog"
    );
}
