//! Diesel table definitions for the PostgreSQL schema.
//!
//! These definitions are maintained manually so the persistence adapter
//! stays compile-safe while migrations evolve. Soft deletes are modelled as
//! a `deleted` flag on every entity table; rows are never physically erased.

diesel::table! {
    languages (id) {
        id -> Uuid,
        #[max_length = 10]
        code -> Varchar,
        display_name -> Text,
        native_name -> Text,
        rtl -> Bool,
        active -> Bool,
        is_default -> Bool,
        created_at -> Timestamptz,
        modified_at -> Timestamptz,
        deleted -> Bool,
    }
}

diesel::table! {
    localization_keys (id) {
        id -> Uuid,
        #[max_length = 255]
        key -> Varchar,
        #[max_length = 100]
        category -> Nullable<Varchar>,
        description -> Nullable<Text>,
        usage_context -> Nullable<Text>,
        created_at -> Timestamptz,
        modified_at -> Timestamptz,
        deleted -> Bool,
    }
}

diesel::table! {
    localizations (id) {
        id -> Uuid,
        key_id -> Uuid,
        language_id -> Uuid,
        value -> Text,
        plural_forms -> Nullable<Jsonb>,
        variables -> Nullable<Jsonb>,
        version -> Int4,
        approved -> Bool,
        approved_by -> Nullable<Text>,
        approved_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
        modified_at -> Timestamptz,
        deleted -> Bool,
    }
}

diesel::table! {
    localization_catalogs (id) {
        id -> Uuid,
        language_id -> Uuid,
        #[max_length = 100]
        category -> Nullable<Varchar>,
        catalog_version -> Int4,
        #[max_length = 64]
        checksum -> Bpchar,
        catalog -> Jsonb,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    localization_cache_keys (id) {
        id -> Uuid,
        pattern -> Text,
        attempts -> Int4,
        next_attempt_at -> Timestamptz,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    localization_audit_log (id) {
        id -> Uuid,
        #[max_length = 20]
        action -> Varchar,
        #[max_length = 20]
        entity_kind -> Varchar,
        entity_id -> Uuid,
        actor -> Text,
        origin -> Nullable<Text>,
        user_agent -> Nullable<Text>,
        diff -> Nullable<Jsonb>,
        created_at -> Timestamptz,
    }
}

diesel::joinable!(localizations -> localization_keys (key_id));
diesel::joinable!(localizations -> languages (language_id));
diesel::joinable!(localization_catalogs -> languages (language_id));

diesel::allow_tables_to_appear_in_same_query!(
    languages,
    localization_keys,
    localizations,
    localization_catalogs,
    localization_cache_keys,
    localization_audit_log,
);
