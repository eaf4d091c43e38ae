//! Localization key aggregate and its validated dotted path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Maximum length of a key path.
pub const MAX_KEY_LEN: usize = 255;

/// Maximum length of a key category.
pub const MAX_CATEGORY_LEN: usize = 100;

/// Validated dotted-path key string (for example `common.buttons.ok`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct KeyPath(String);

impl KeyPath {
    /// Construct a key path after validating length and shape.
    pub fn new(value: impl Into<String>) -> Result<Self, KeyValidationError> {
        let raw = value.into();
        if raw.trim().is_empty() {
            return Err(KeyValidationError::EmptyKey);
        }
        if raw.trim() != raw {
            return Err(KeyValidationError::PaddedKey);
        }
        if raw.len() > MAX_KEY_LEN {
            return Err(KeyValidationError::KeyTooLong { length: raw.len() });
        }
        if raw.starts_with('.') || raw.ends_with('.') || raw.contains("..") {
            return Err(KeyValidationError::MalformedPath { key: raw });
        }
        Ok(Self(raw))
    }

    /// Borrow the underlying path as a string slice.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Display for KeyPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for KeyPath {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl TryFrom<String> for KeyPath {
    type Error = KeyValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<KeyPath> for String {
    fn from(value: KeyPath) -> Self {
        value.0
    }
}

/// Validate an optional key category.
///
/// An empty or whitespace-only category normalizes to `None`
/// ("uncategorized"); a present category must fit [`MAX_CATEGORY_LEN`].
pub fn normalize_category(category: Option<String>) -> Result<Option<String>, KeyValidationError> {
    match category {
        None => Ok(None),
        Some(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            if trimmed.len() > MAX_CATEGORY_LEN {
                return Err(KeyValidationError::CategoryTooLong {
                    length: trimmed.len(),
                });
            }
            Ok(Some(trimmed.to_owned()))
        }
    }
}

/// Validation errors raised by key constructors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyValidationError {
    /// Key is empty after trimming whitespace.
    #[error("localization key must not be empty")]
    EmptyKey,
    /// Key contains leading or trailing whitespace.
    #[error("localization key must not contain surrounding whitespace")]
    PaddedKey,
    /// Key exceeds [`MAX_KEY_LEN`] bytes.
    #[error("localization key must be at most {MAX_KEY_LEN} characters, got {length}")]
    KeyTooLong { length: usize },
    /// Key has empty dotted-path segments.
    #[error("localization key '{key}' has empty path segments")]
    MalformedPath { key: String },
    /// Category exceeds [`MAX_CATEGORY_LEN`] bytes.
    #[error("category must be at most {MAX_CATEGORY_LEN} characters, got {length}")]
    CategoryTooLong { length: usize },
}

/// A translatable key registered in the catalog.
///
/// ## Invariants
/// - `key` is unique among non-deleted rows (enforced by the store).
/// - `category = None` means "uncategorized"; it is matched by unfiltered
///   catalog builds only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalizationKey {
    pub id: Uuid,
    pub key: KeyPath,
    pub category: Option<String>,
    pub description: Option<String>,
    pub usage_context: Option<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub deleted: bool,
}

/// Validated input for registering a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDraft {
    pub key: KeyPath,
    pub category: Option<String>,
    pub description: Option<String>,
    pub usage_context: Option<String>,
}

impl KeyDraft {
    /// Validate and create a draft.
    pub fn new(key: KeyPath, category: Option<String>) -> Result<Self, KeyValidationError> {
        Ok(Self {
            key,
            category: normalize_category(category)?,
            description: None,
            usage_context: None,
        })
    }

    /// Attach a human-readable description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Attach usage context for translators.
    pub fn usage_context(mut self, usage_context: impl Into<String>) -> Self {
        self.usage_context = Some(usage_context.into());
        self
    }
}

/// Field-level changes applied to an existing key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyUpdate {
    /// `Some(None)` clears the category, `Some(Some(_))` replaces it.
    pub category: Option<Option<String>>,
    pub description: Option<String>,
    pub usage_context: Option<String>,
}

impl KeyUpdate {
    /// Whether the update changes anything at all.
    pub const fn is_empty(&self) -> bool {
        self.category.is_none() && self.description.is_none() && self.usage_context.is_none()
    }
}

#[cfg(test)]
mod tests {
    //! Validates key path and category constraints.
    use super::{KeyPath, KeyValidationError, MAX_KEY_LEN, normalize_category};
    use rstest::rstest;

    #[rstest]
    #[case("common.ok")]
    #[case("errors.network.timeout")]
    #[case("title")]
    fn accepts_dotted_paths(#[case] key: &str) {
        let parsed = KeyPath::new(key).expect("valid key");
        assert_eq!(parsed.as_str(), key);
    }

    #[rstest]
    #[case(".common.ok")]
    #[case("common.ok.")]
    #[case("common..ok")]
    fn rejects_empty_segments(#[case] key: &str) {
        assert!(matches!(
            KeyPath::new(key).expect_err("rejected"),
            KeyValidationError::MalformedPath { .. }
        ));
    }

    #[rstest]
    fn rejects_overlong_key() {
        let key = "k".repeat(MAX_KEY_LEN + 1);
        assert!(matches!(
            KeyPath::new(key).expect_err("rejected"),
            KeyValidationError::KeyTooLong { .. }
        ));
    }

    #[rstest]
    #[case(None, None)]
    #[case(Some("".to_owned()), None)]
    #[case(Some("  ".to_owned()), None)]
    #[case(Some("buttons".to_owned()), Some("buttons"))]
    #[case(Some(" buttons ".to_owned()), Some("buttons"))]
    fn category_normalizes_blank_to_none(
        #[case] input: Option<String>,
        #[case] expected: Option<&str>,
    ) {
        let normalized = normalize_category(input).expect("valid category");
        assert_eq!(normalized.as_deref(), expected);
    }

    #[rstest]
    fn category_rejects_overlong_value() {
        let category = Some("c".repeat(101));
        assert!(matches!(
            normalize_category(category).expect_err("rejected"),
            KeyValidationError::CategoryTooLong { .. }
        ));
    }
}
