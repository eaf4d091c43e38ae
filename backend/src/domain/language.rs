//! Language aggregate and its validated identifier.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Maximum length of a language short code.
pub const MAX_CODE_LEN: usize = 10;

/// Validated language short code (for example `en` or `pt-BR`).
///
/// Codes are stable once assigned; renames are modelled as a new language.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LanguageCode(String);

impl LanguageCode {
    /// Construct a code after validating length and character set.
    pub fn new(value: impl Into<String>) -> Result<Self, LanguageValidationError> {
        let raw = value.into();
        if raw.trim().is_empty() {
            return Err(LanguageValidationError::EmptyCode);
        }
        if raw.trim() != raw {
            return Err(LanguageValidationError::PaddedCode);
        }
        if raw.chars().count() > MAX_CODE_LEN {
            return Err(LanguageValidationError::CodeTooLong { length: raw.len() });
        }
        if !raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(LanguageValidationError::InvalidCodeCharacters { code: raw });
        }
        Ok(Self(raw))
    }

    /// Borrow the underlying code as a string slice.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for LanguageCode {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl TryFrom<String> for LanguageCode {
    type Error = LanguageValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<LanguageCode> for String {
    fn from(value: LanguageCode) -> Self {
        value.0
    }
}

/// Validation errors raised by language constructors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LanguageValidationError {
    /// Code is empty after trimming whitespace.
    #[error("language code must not be empty")]
    EmptyCode,
    /// Code contains leading or trailing whitespace.
    #[error("language code must not contain surrounding whitespace")]
    PaddedCode,
    /// Code exceeds [`MAX_CODE_LEN`] characters.
    #[error("language code must be at most {MAX_CODE_LEN} characters, got {length}")]
    CodeTooLong { length: usize },
    /// Code contains characters outside `[A-Za-z0-9_-]`.
    #[error("language code '{code}' contains invalid characters")]
    InvalidCodeCharacters { code: String },
    /// Display name is empty after trimming whitespace.
    #[error("language display name must not be empty")]
    EmptyDisplayName,
}

/// A language available for localization.
///
/// ## Invariants
/// - At most one language has `default = true` among non-deleted rows
///   (enforced by the store).
/// - `code` is unique among non-deleted rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Language {
    pub id: Uuid,
    pub code: LanguageCode,
    pub display_name: String,
    pub native_name: String,
    pub rtl: bool,
    pub active: bool,
    pub default: bool,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub deleted: bool,
}

/// Validated input for creating a language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageDraft {
    pub code: LanguageCode,
    pub display_name: String,
    pub native_name: String,
    pub rtl: bool,
    pub active: bool,
    pub default: bool,
}

impl LanguageDraft {
    /// Validate and create a draft.
    pub fn new(
        code: LanguageCode,
        display_name: impl Into<String>,
        native_name: impl Into<String>,
    ) -> Result<Self, LanguageValidationError> {
        let display_name = display_name.into();
        if display_name.trim().is_empty() {
            return Err(LanguageValidationError::EmptyDisplayName);
        }
        let native_name = native_name.into();
        let native_name = if native_name.trim().is_empty() {
            display_name.clone()
        } else {
            native_name
        };
        Ok(Self {
            code,
            display_name,
            native_name,
            rtl: false,
            active: true,
            default: false,
        })
    }

    /// Mark the language as right-to-left.
    pub const fn rtl(mut self, rtl: bool) -> Self {
        self.rtl = rtl;
        self
    }

    /// Set the active flag.
    pub const fn active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// Mark the language as the ecosystem default.
    pub const fn default_language(mut self, default: bool) -> Self {
        self.default = default;
        self
    }
}

/// Field-level changes applied to an existing language.
///
/// `None` leaves the field untouched; the code itself is immutable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LanguageUpdate {
    pub display_name: Option<String>,
    pub native_name: Option<String>,
    pub rtl: Option<bool>,
    pub active: Option<bool>,
    pub default: Option<bool>,
}

impl LanguageUpdate {
    /// Whether the update changes anything at all.
    pub const fn is_empty(&self) -> bool {
        self.display_name.is_none()
            && self.native_name.is_none()
            && self.rtl.is_none()
            && self.active.is_none()
            && self.default.is_none()
    }
}
