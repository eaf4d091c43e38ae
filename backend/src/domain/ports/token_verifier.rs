//! Port for bearer token verification.
//!
//! Token parsing and signature checking live behind this boundary; the
//! orchestrator only sees verified claims.

use async_trait::async_trait;

use crate::domain::Error;

use super::define_port_error;

define_port_error! {
    /// Errors surfaced by token verifier adapters.
    pub enum TokenVerifierError {
        /// The token is malformed, forged, or expired.
        Invalid { message: String } => "invalid token: {message}",
    }
}

impl From<TokenVerifierError> for Error {
    fn from(err: TokenVerifierError) -> Self {
        match err {
            TokenVerifierError::Invalid { message } => Self::unauthenticated(message),
        }
    }
}

/// Claims extracted from a verified bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedToken {
    /// Stable subject identity (used as the audit actor).
    pub subject: String,
    /// Role names granted to the subject.
    pub roles: Vec<String>,
}

impl VerifiedToken {
    /// Whether the token carries any of the given roles.
    pub fn has_any_role<'a>(&self, roles: impl IntoIterator<Item = &'a str>) -> bool {
        roles
            .into_iter()
            .any(|role| self.roles.iter().any(|held| held == role))
    }
}

/// Port verifying opaque bearer tokens into claims.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Verify a raw bearer token.
    async fn verify(&self, token: &str) -> Result<VerifiedToken, TokenVerifierError>;
}

/// Fixture verifier accepting every token as the given subject.
#[derive(Debug, Clone)]
pub struct FixtureTokenVerifier {
    subject: String,
    roles: Vec<String>,
}

impl FixtureTokenVerifier {
    /// Accept all tokens as `subject` holding `roles`.
    pub fn new(subject: impl Into<String>, roles: Vec<String>) -> Self {
        Self {
            subject: subject.into(),
            roles,
        }
    }
}

#[async_trait]
impl TokenVerifier for FixtureTokenVerifier {
    async fn verify(&self, _token: &str) -> Result<VerifiedToken, TokenVerifierError> {
        Ok(VerifiedToken {
            subject: self.subject.clone(),
            roles: self.roles.clone(),
        })
    }
}
