//! Shared-secret bearer token verifier.
//!
//! Tokens are `<hex(claims-json)>.<hex(hmac-sha256(claims-json))>` signed
//! with the configured secret. This keeps token issuance a deployment
//! concern (any holder of the secret can mint) while the service only ever
//! verifies. Signature comparison is constant-time.

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::domain::ports::{TokenVerifier, TokenVerifierError, VerifiedToken};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Serialize, Deserialize)]
struct TokenClaims {
    sub: String,
    #[serde(default)]
    roles: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    exp: Option<i64>,
}

/// HMAC-SHA256 verifier over the configured shared secret.
#[derive(Clone)]
pub struct HmacTokenVerifier {
    secret: Vec<u8>,
}

impl HmacTokenVerifier {
    /// Create a verifier for the given secret.
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    /// Mint a token for the given subject and roles (tooling and tests).
    pub fn issue(
        &self,
        subject: impl Into<String>,
        roles: Vec<String>,
        expires_at: Option<i64>,
    ) -> String {
        let claims = TokenClaims {
            sub: subject.into(),
            roles,
            exp: expires_at,
        };
        // Serializing a struct of strings cannot fail.
        let payload = serde_json::to_vec(&claims).unwrap_or_default();
        let signature = self.signature(&payload);
        format!("{}.{}", hex::encode(&payload), hex::encode(signature))
    }

    fn signature(&self, payload: &[u8]) -> Vec<u8> {
        // Hmac accepts keys of any length, so construction cannot fail; an
        // empty signature on the impossible path simply never verifies.
        let Ok(mut mac) = HmacSha256::new_from_slice(&self.secret) else {
            return Vec::new();
        };
        mac.update(payload);
        mac.finalize().into_bytes().to_vec()
    }
}

#[async_trait]
impl TokenVerifier for HmacTokenVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedToken, TokenVerifierError> {
        let (payload_hex, signature_hex) = token
            .split_once('.')
            .ok_or_else(|| TokenVerifierError::invalid("malformed token"))?;
        let payload = hex::decode(payload_hex)
            .map_err(|_| TokenVerifierError::invalid("malformed token payload"))?;
        let signature = hex::decode(signature_hex)
            .map_err(|_| TokenVerifierError::invalid("malformed token signature"))?;

        let expected = self.signature(&payload);
        if expected.ct_eq(&signature).unwrap_u8() != 1 {
            return Err(TokenVerifierError::invalid("signature mismatch"));
        }

        let claims: TokenClaims = serde_json::from_slice(&payload)
            .map_err(|_| TokenVerifierError::invalid("malformed token claims"))?;
        if let Some(exp) = claims.exp {
            if exp <= Utc::now().timestamp() {
                return Err(TokenVerifierError::invalid("token expired"));
            }
        }
        Ok(VerifiedToken {
            subject: claims.sub,
            roles: claims.roles,
        })
    }
}
