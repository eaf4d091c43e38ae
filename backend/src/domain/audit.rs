//! Append-only audit trail of admin actions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of admin action recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    Approve,
    Invalidate,
}

impl AuditAction {
    /// Stable string form stored in the audit table.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Approve => "approve",
            Self::Invalidate => "invalidate",
        }
    }

    /// Parse the stored string form.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "create" => Some(Self::Create),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            "approve" => Some(Self::Approve),
            "invalidate" => Some(Self::Invalidate),
            _ => None,
        }
    }
}

/// Kind of entity an audit record refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditEntityKind {
    Language,
    Key,
    Localization,
    Cache,
}

impl AuditEntityKind {
    /// Stable string form stored in the audit table.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Language => "language",
            Self::Key => "key",
            Self::Localization => "localization",
            Self::Cache => "cache",
        }
    }

    /// Parse the stored string form.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "language" => Some(Self::Language),
            "key" => Some(Self::Key),
            "localization" => Some(Self::Localization),
            "cache" => Some(Self::Cache),
            _ => None,
        }
    }
}

/// Who performed an admin action and from where.
///
/// Extracted at the HTTP boundary and threaded through every mutation so the
/// store can append the audit record inside the mutation's transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditContext {
    pub actor: String,
    pub origin: Option<String>,
    pub user_agent: Option<String>,
}

impl AuditContext {
    /// Construct a context for the given actor identity.
    pub fn new(actor: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
            origin: None,
            user_agent: None,
        }
    }

    /// Attach the request's origin address.
    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Attach the request's user agent.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }
}

/// One appended audit record; never mutated or deleted.
///
/// `diff` stores only changed fields as `{"before": {...}, "after": {...}}`.
/// Translated value fields are not secret and appear verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditRecord {
    pub id: Uuid,
    pub action: AuditAction,
    pub entity_kind: AuditEntityKind,
    pub entity_id: Uuid,
    pub actor: String,
    pub origin: Option<String>,
    pub user_agent: Option<String>,
    pub diff: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Filter for audit reads; all fields are conjunctive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditFilter {
    pub entity_kind: Option<AuditEntityKind>,
    pub entity_id: Option<Uuid>,
    pub actor: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

/// Build a changed-fields-only diff from before/after field pairs.
///
/// Pairs whose before and after values are equal are dropped; an empty diff
/// yields `None`.
pub fn changed_fields_diff(
    fields: &[(&str, serde_json::Value, serde_json::Value)],
) -> Option<serde_json::Value> {
    let mut before = serde_json::Map::new();
    let mut after = serde_json::Map::new();
    for (name, old, new) in fields {
        if old != new {
            before.insert((*name).to_owned(), old.clone());
            after.insert((*name).to_owned(), new.clone());
        }
    }
    if after.is_empty() {
        return None;
    }
    Some(serde_json::json!({ "before": before, "after": after }))
}

#[cfg(test)]
mod tests {
    //! Audit action round-trips and diff construction.
    use super::{AuditAction, AuditEntityKind, changed_fields_diff};
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(AuditAction::Create)]
    #[case(AuditAction::Update)]
    #[case(AuditAction::Delete)]
    #[case(AuditAction::Approve)]
    #[case(AuditAction::Invalidate)]
    fn action_string_round_trip(#[case] action: AuditAction) {
        assert_eq!(AuditAction::parse(action.as_str()), Some(action));
    }

    #[rstest]
    #[case(AuditEntityKind::Language)]
    #[case(AuditEntityKind::Key)]
    #[case(AuditEntityKind::Localization)]
    #[case(AuditEntityKind::Cache)]
    fn entity_kind_string_round_trip(#[case] kind: AuditEntityKind) {
        assert_eq!(AuditEntityKind::parse(kind.as_str()), Some(kind));
    }

    #[rstest]
    fn diff_keeps_changed_fields_only() {
        let diff = changed_fields_diff(&[
            ("value", json!("OK"), json!("OK (DE)")),
            ("approved", json!(true), json!(true)),
        ])
        .expect("changed fields present");
        assert_eq!(
            diff,
            json!({
                "before": { "value": "OK" },
                "after": { "value": "OK (DE)" },
            })
        );
    }

    #[rstest]
    fn diff_of_identical_fields_is_none() {
        assert!(changed_fields_diff(&[("rtl", json!(false), json!(false))]).is_none());
    }
}
