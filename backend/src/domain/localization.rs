//! Localization aggregate: one translated value for a (key, language) pair.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::key::KeyPath;
use super::language::LanguageCode;

/// One named placeholder a value expects at interpolation time.
///
/// Interpolation happens client-side; the service only surfaces the schema so
/// clients know which placeholders a value carries and in what order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VariableSpec {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl VariableSpec {
    /// Construct a placeholder spec.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: None,
        }
    }
}

/// Ordered placeholder schema attached to a localization value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariableSchema(Vec<VariableSpec>);

impl VariableSchema {
    /// Validate and create a schema.
    ///
    /// Placeholder names must be non-empty and unique within one value.
    pub fn new(specs: Vec<VariableSpec>) -> Result<Self, LocalizationValidationError> {
        for (index, spec) in specs.iter().enumerate() {
            if spec.name.trim().is_empty() {
                return Err(LocalizationValidationError::EmptyVariableName { index });
            }
            if specs
                .iter()
                .take(index)
                .any(|earlier| earlier.name == spec.name)
            {
                return Err(LocalizationValidationError::DuplicateVariableName {
                    name: spec.name.clone(),
                });
            }
        }
        Ok(Self(specs))
    }

    /// Borrow the ordered placeholder list.
    pub fn specs(&self) -> &[VariableSpec] {
        &self.0
    }
}

/// Validation errors raised by localization constructors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocalizationValidationError {
    /// The translated value is empty.
    #[error("localization value must not be empty")]
    EmptyValue,
    /// A placeholder at `index` has an empty name.
    #[error("variable at position {index} has an empty name")]
    EmptyVariableName { index: usize },
    /// Two placeholders share a name.
    #[error("variable '{name}' appears more than once")]
    DuplicateVariableName { name: String },
    /// The plural-forms blob is not a JSON object.
    #[error("plural forms must be a JSON object")]
    MalformedPluralForms,
}

/// A translated value for one (key, language) pair.
///
/// ## Invariants
/// - `(key_id, language_id)` is unique among non-deleted rows.
/// - `version` is monotone non-decreasing per (key, language); the store bumps
///   it only when value, plural forms, or variables change.
/// - `approved` implies `approved_by` and `approved_at` are set.
#[derive(Debug, Clone, PartialEq)]
pub struct Localization {
    pub id: Uuid,
    pub key_id: Uuid,
    pub language_id: Uuid,
    pub value: String,
    /// Opaque plural-forms blob; never evaluated server-side.
    pub plural_forms: Option<serde_json::Value>,
    pub variables: Option<VariableSchema>,
    pub version: i32,
    pub approved: bool,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub deleted: bool,
}

/// Validated input for upserting a localization.
///
/// The key is addressed by path so an upsert can register a missing key in
/// the same operation; the language by code.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalizationUpsert {
    pub key: KeyPath,
    pub category: Option<String>,
    pub language: LanguageCode,
    pub value: String,
    pub plural_forms: Option<serde_json::Value>,
    pub variables: Option<VariableSchema>,
    pub approved: bool,
}

impl LocalizationUpsert {
    /// Validate and create an upsert request.
    pub fn new(
        key: KeyPath,
        language: LanguageCode,
        value: impl Into<String>,
    ) -> Result<Self, LocalizationValidationError> {
        let value = value.into();
        if value.is_empty() {
            return Err(LocalizationValidationError::EmptyValue);
        }
        Ok(Self {
            key,
            category: None,
            language,
            value,
            plural_forms: None,
            variables: None,
            approved: false,
        })
    }

    /// Attach a key category used when the key must be created.
    pub fn category(mut self, category: Option<String>) -> Self {
        self.category = category;
        self
    }

    /// Attach an opaque plural-forms blob.
    pub fn plural_forms(
        mut self,
        plural_forms: serde_json::Value,
    ) -> Result<Self, LocalizationValidationError> {
        if !plural_forms.is_object() {
            return Err(LocalizationValidationError::MalformedPluralForms);
        }
        self.plural_forms = Some(plural_forms);
        Ok(self)
    }

    /// Attach a placeholder schema.
    pub fn variables(mut self, variables: VariableSchema) -> Self {
        self.variables = Some(variables);
        self
    }

    /// Request approval as part of the upsert.
    pub const fn approved(mut self, approved: bool) -> Self {
        self.approved = approved;
        self
    }
}
