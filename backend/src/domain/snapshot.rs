//! Catalog snapshots: fingerprints, persisted snapshots, and the in-memory
//! serving representation.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::checksum::{Checksum, catalog_checksum};
use super::language::LanguageCode;
use super::localization::VariableSchema;

/// Segment standing in for "no category filter" inside cache keys.
const ANY_CATEGORY: &str = "*";

/// Identity of a buildable snapshot: `(language, category-or-empty, version)`.
///
/// The canonical rendering doubles as the cache key for the immutable catalog
/// document; [`Fingerprint::latest_key`] is the mutable "latest" pointer that
/// omits the version segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    pub language: LanguageCode,
    pub category: Option<String>,
    pub version: i32,
}

impl Fingerprint {
    /// Construct a fingerprint.
    pub const fn new(language: LanguageCode, category: Option<String>, version: i32) -> Self {
        Self {
            language,
            category,
            version,
        }
    }

    /// Cache key for the immutable snapshot this fingerprint names.
    pub fn cache_key(&self) -> String {
        format!(
            "catalog:{}:{}:{}",
            self.language,
            self.category.as_deref().unwrap_or(ANY_CATEGORY),
            self.version
        )
    }

    /// Cache key of the "latest" pointer for a (language, category) pair.
    pub fn latest_key(language: &LanguageCode, category: Option<&str>) -> String {
        format!(
            "catalog:{}:{}",
            language,
            category.unwrap_or(ANY_CATEGORY)
        )
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.cache_key())
    }
}

/// A persisted, immutable catalog snapshot.
///
/// ## Invariants
/// - `checksum` equals the checksum of `entries` in canonical form.
/// - `(language_id, category, version)` is unique; rows are never updated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogSnapshot {
    pub id: Uuid,
    pub language_id: Uuid,
    pub language: LanguageCode,
    pub category: Option<String>,
    pub entries: BTreeMap<String, String>,
    pub version: i32,
    pub checksum: Checksum,
    pub created_at: DateTime<Utc>,
}

impl CatalogSnapshot {
    /// Fingerprint naming this snapshot.
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::new(self.language.clone(), self.category.clone(), self.version)
    }
}

/// One entry of the serving representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub key: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<VariableSchema>,
}

/// Serializable catalog payload exchanged with the cache tiers.
///
/// Entries are ordered by key; the checksum covers the `key -> value`
/// mapping only (variable schemas ride along for the resolver but are not
/// part of the canonical form).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogDocument {
    pub language: LanguageCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub version: i32,
    pub checksum: String,
    pub entries: Vec<CatalogEntry>,
}

/// In-memory catalog: the ordered entry array plus a key index built once at
/// load so batch lookups stay O(1) per key.
#[derive(Debug, Clone)]
pub struct CatalogData {
    doc: CatalogDocument,
    index: HashMap<String, usize>,
}

impl CatalogData {
    /// Build the serving representation from a document, indexing entries.
    pub fn from_document(doc: CatalogDocument) -> Self {
        let index = doc
            .entries
            .iter()
            .enumerate()
            .map(|(position, entry)| (entry.key.clone(), position))
            .collect();
        Self { doc, index }
    }

    /// Assemble a catalog from ordered entries, computing the checksum.
    pub fn assemble(
        language: LanguageCode,
        category: Option<String>,
        version: i32,
        entries: Vec<CatalogEntry>,
    ) -> Self {
        let mapping: BTreeMap<String, String> = entries
            .iter()
            .map(|entry| (entry.key.clone(), entry.value.clone()))
            .collect();
        let checksum = catalog_checksum(&mapping).to_hex();
        Self::from_document(CatalogDocument {
            language,
            category,
            version,
            checksum,
            entries,
        })
    }

    /// Language this catalog serves.
    pub const fn language(&self) -> &LanguageCode {
        &self.doc.language
    }

    /// Category filter the catalog was built with, if any.
    pub fn category(&self) -> Option<&str> {
        self.doc.category.as_deref()
    }

    /// Catalog version within its (language, category) sequence.
    pub const fn version(&self) -> i32 {
        self.doc.version
    }

    /// Hex checksum of the canonical `key -> value` mapping.
    pub fn checksum(&self) -> &str {
        &self.doc.checksum
    }

    /// Ordered entries.
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.doc.entries
    }

    /// Look up one entry by key.
    pub fn get(&self, key: &str) -> Option<&CatalogEntry> {
        self.index
            .get(key)
            .and_then(|position| self.doc.entries.get(*position))
    }

    /// The `key -> value` mapping in canonical order.
    pub fn mapping(&self) -> BTreeMap<String, String> {
        self.doc
            .entries
            .iter()
            .map(|entry| (entry.key.clone(), entry.value.clone()))
            .collect()
    }

    /// Borrow the serializable document.
    pub const fn document(&self) -> &CatalogDocument {
        &self.doc
    }

    /// Fingerprint naming this catalog.
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::new(
            self.doc.language.clone(),
            self.doc.category.clone(),
            self.doc.version,
        )
    }
}

#[cfg(test)]
mod tests {
    //! Fingerprint key shapes and serving-representation behaviour.
    use super::{CatalogData, CatalogEntry, Fingerprint};
    use crate::domain::checksum::catalog_checksum;
    use crate::domain::language::LanguageCode;
    use rstest::rstest;

    fn lang(code: &str) -> LanguageCode {
        LanguageCode::new(code).expect("valid code")
    }

    #[rstest]
    #[case(None, 3, "catalog:en:*:3")]
    #[case(Some("buttons".to_owned()), 1, "catalog:en:buttons:1")]
    fn fingerprint_cache_key_shape(
        #[case] category: Option<String>,
        #[case] version: i32,
        #[case] expected: &str,
    ) {
        let fingerprint = Fingerprint::new(lang("en"), category, version);
        assert_eq!(fingerprint.cache_key(), expected);
    }

    #[rstest]
    fn latest_key_omits_version() {
        assert_eq!(Fingerprint::latest_key(&lang("de"), None), "catalog:de:*");
        assert_eq!(
            Fingerprint::latest_key(&lang("de"), Some("errors")),
            "catalog:de:errors"
        );
    }

    #[rstest]
    fn assemble_computes_checksum_over_mapping() {
        let data = CatalogData::assemble(
            lang("en"),
            None,
            1,
            vec![CatalogEntry {
                key: "common.ok".to_owned(),
                value: "OK".to_owned(),
                variables: None,
            }],
        );
        assert_eq!(data.checksum(), catalog_checksum(&data.mapping()).to_hex());
        assert_eq!(data.version(), 1);
    }

    #[rstest]
    fn index_serves_lookups_after_round_trip() {
        let data = CatalogData::assemble(
            lang("en"),
            None,
            2,
            vec![
                CatalogEntry {
                    key: "a.first".to_owned(),
                    value: "first".to_owned(),
                    variables: None,
                },
                CatalogEntry {
                    key: "b.second".to_owned(),
                    value: "second".to_owned(),
                    variables: None,
                },
            ],
        );

        let json = serde_json::to_string(data.document()).expect("serializable");
        let revived = CatalogData::from_document(
            serde_json::from_str(&json).expect("deserializable"),
        );
        assert_eq!(
            revived.get("b.second").map(|entry| entry.value.as_str()),
            Some("second")
        );
        assert!(revived.get("missing").is_none());
    }

    #[rstest]
    fn empty_catalog_is_valid() {
        let data = CatalogData::assemble(lang("tlh"), None, 1, Vec::new());
        assert_eq!(
            data.checksum(),
            "44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a"
        );
        assert!(data.entries().is_empty());
    }
}
