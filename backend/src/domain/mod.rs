//! Domain primitives, aggregates, and the catalog engine services.
//!
//! Purpose: keep the whole catalog engine (snapshot building, tiered
//! caching, single-flight coordination, resolution, admin mutation, and the
//! audit trail) behind transport-agnostic types. Adapters (HTTP in,
//! Diesel/redis out) depend on this module, never the reverse.

pub mod admin_service;
pub mod audit;
pub mod builder;
pub mod cache;
pub mod catalog_service;
pub mod checksum;
pub mod error;
pub mod key;
pub mod language;
pub mod localization;
pub mod ports;
pub mod resolver;
pub mod single_flight;
pub mod snapshot;

pub use self::admin_service::{AdminService, InvalidationRetryTask};
pub use self::audit::{
    AuditAction, AuditContext, AuditEntityKind, AuditFilter, AuditRecord, changed_fields_diff,
};
pub use self::builder::SnapshotBuilder;
pub use self::cache::{CacheTtls, RequestScope, TieredCache, glob_match};
pub use self::catalog_service::{
    BatchResolution, CatalogFetch, CatalogService, ComponentHealth, HealthReport,
};
pub use self::checksum::{Checksum, ChecksumParseError, canonical_json, catalog_checksum};
pub use self::error::{Error, ErrorCode, ErrorValidationError};
pub use self::key::{KeyDraft, KeyPath, KeyUpdate, KeyValidationError, LocalizationKey};
pub use self::language::{
    Language, LanguageCode, LanguageDraft, LanguageUpdate, LanguageValidationError,
};
pub use self::localization::{
    Localization, LocalizationUpsert, LocalizationValidationError, VariableSchema, VariableSpec,
};
pub use self::resolver::{ResolutionStatus, ResolvedValue, Resolver};
pub use self::single_flight::SingleFlight;
pub use self::snapshot::{
    CatalogData, CatalogDocument, CatalogEntry, CatalogSnapshot, Fingerprint,
};

/// Convenient domain result alias.
pub type DomainResult<T> = Result<T, Error>;
