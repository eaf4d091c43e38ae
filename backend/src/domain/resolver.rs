//! Key and batch lookup over acquired catalog snapshots.
//!
//! Resolution is pure: the orchestrator acquires the target (and, when
//! fallback is enabled, the default-language) catalog once, then this module
//! answers every key from those snapshots. Values are returned verbatim;
//! placeholder interpolation is a client concern, and the schema is surfaced so
//! clients know what to interpolate.

use std::sync::Arc;

use serde::Serialize;

use crate::domain::language::LanguageCode;
use crate::domain::localization::VariableSchema;
use crate::domain::snapshot::CatalogData;

/// How a key was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionStatus {
    /// Found in the requested language.
    Present,
    /// Found in the default language via fallback.
    Fallback,
    /// Not found anywhere.
    Missing,
}

/// One resolved value with its provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedValue {
    pub value: String,
    /// Language the value actually came from (differs from the request
    /// language when fallback applied).
    pub language: LanguageCode,
    pub variables: Option<VariableSchema>,
    pub status: ResolutionStatus,
}

/// Lookup view over a target catalog and an optional fallback catalog.
pub struct Resolver {
    target: Arc<CatalogData>,
    fallback: Option<Arc<CatalogData>>,
}

impl Resolver {
    /// Create a resolver over the target catalog.
    pub const fn new(target: Arc<CatalogData>) -> Self {
        Self {
            target,
            fallback: None,
        }
    }

    /// Attach the default-language catalog for fallback resolution.
    pub fn with_fallback(mut self, fallback: Arc<CatalogData>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Resolve one key.
    pub fn resolve(&self, key: &str) -> Option<ResolvedValue> {
        if let Some(entry) = self.target.get(key) {
            return Some(ResolvedValue {
                value: entry.value.clone(),
                language: self.target.language().clone(),
                variables: entry.variables.clone(),
                status: ResolutionStatus::Present,
            });
        }
        let fallback = self.fallback.as_ref()?;
        fallback.get(key).map(|entry| ResolvedValue {
            value: entry.value.clone(),
            language: fallback.language().clone(),
            variables: entry.variables.clone(),
            status: ResolutionStatus::Fallback,
        })
    }

    /// Resolve a batch of keys, preserving request order.
    ///
    /// Missing keys are reported with [`ResolutionStatus::Missing`] rather
    /// than dropped, so the response mirrors the request shape.
    pub fn resolve_batch(&self, keys: &[String]) -> Vec<(String, Option<ResolvedValue>)> {
        keys.iter()
            .map(|key| (key.clone(), self.resolve(key)))
            .collect()
    }
}
