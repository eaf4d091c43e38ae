//! Bearer token extraction so handlers stay free of header plumbing.
//!
//! The extractor verifies the `Authorization: Bearer` token through the
//! configured verifier port and captures the request's origin and user agent
//! for the audit trail. Handlers ask for [`AuthContext`] and, on admin
//! surfaces, call [`AuthContext::require_admin`].

use actix_web::http::header;
use actix_web::{FromRequest, HttpRequest, dev::Payload, web};
use futures_util::future::LocalBoxFuture;
use std::collections::HashSet;

use crate::domain::Error;
use crate::domain::audit::AuditContext;
use crate::domain::ports::VerifiedToken;
use crate::inbound::http::state::HttpState;

/// Verified caller identity plus request provenance.
#[derive(Debug, Clone)]
pub struct AuthContext {
    token: VerifiedToken,
    origin: Option<String>,
    user_agent: Option<String>,
}

impl AuthContext {
    /// Stable subject identity of the caller.
    pub fn subject(&self) -> &str {
        &self.token.subject
    }

    /// Fail with `Forbidden` unless the caller holds one of the admin roles.
    pub fn require_admin(&self, admin_roles: &HashSet<String>) -> Result<(), Error> {
        if self
            .token
            .has_any_role(admin_roles.iter().map(String::as_str))
        {
            Ok(())
        } else {
            Err(Error::forbidden("admin role required"))
        }
    }

    /// Audit context naming this caller and request.
    pub fn audit_context(&self) -> AuditContext {
        let mut ctx = AuditContext::new(self.token.subject.clone());
        if let Some(origin) = &self.origin {
            ctx = ctx.origin(origin.clone());
        }
        if let Some(user_agent) = &self.user_agent {
            ctx = ctx.user_agent(user_agent.clone());
        }
        ctx
    }
}

fn bearer_token(req: &HttpRequest) -> Result<String, Error> {
    let header = req
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or_else(|| Error::unauthenticated("missing bearer token"))?;
    let value = header
        .to_str()
        .map_err(|_| Error::unauthenticated("malformed authorization header"))?;
    value
        .strip_prefix("Bearer ")
        .map(str::to_owned)
        .ok_or_else(|| Error::unauthenticated("authorization scheme must be Bearer"))
}

fn header_value(req: &HttpRequest, name: header::HeaderName) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
}

impl FromRequest for AuthContext {
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let state = web::Data::<HttpState>::extract(req).into_inner();
        let raw_token = bearer_token(req);
        let origin = req
            .connection_info()
            .realip_remote_addr()
            .map(str::to_owned);
        let user_agent = header_value(req, header::USER_AGENT);
        Box::pin(async move {
            let state =
                state.map_err(|_| Error::internal("http state missing from request"))?;
            let raw_token = raw_token?;
            let token = state.verifier.verify(&raw_token).await?;
            Ok(Self {
                token,
                origin,
                user_agent,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    //! Role gating and audit context assembly.
    use super::AuthContext;
    use crate::domain::ErrorCode;
    use crate::domain::ports::VerifiedToken;
    use rstest::rstest;
    use std::collections::HashSet;

    fn context(roles: &[&str]) -> AuthContext {
        AuthContext {
            token: VerifiedToken {
                subject: "ops@example.com".to_owned(),
                roles: roles.iter().map(|role| (*role).to_owned()).collect(),
            },
            origin: Some("203.0.113.9".to_owned()),
            user_agent: Some("lexicon-cli/1.0".to_owned()),
        }
    }

    fn admin_roles() -> HashSet<String> {
        ["admin".to_owned(), "localization-admin".to_owned()]
            .into_iter()
            .collect()
    }

    #[rstest]
    fn admin_role_passes_the_gate() {
        assert!(context(&["localization-admin"]).require_admin(&admin_roles()).is_ok());
    }

    #[rstest]
    fn missing_admin_role_is_forbidden() {
        let err = context(&["viewer"])
            .require_admin(&admin_roles())
            .expect_err("forbidden");
        assert_eq!(err.code(), ErrorCode::Forbidden);
    }

    #[rstest]
    fn audit_context_carries_provenance() {
        let ctx = context(&["admin"]).audit_context();
        assert_eq!(ctx.actor, "ops@example.com");
        assert_eq!(ctx.origin.as_deref(), Some("203.0.113.9"));
        assert_eq!(ctx.user_agent.as_deref(), Some("lexicon-cli/1.0"));
    }
}
