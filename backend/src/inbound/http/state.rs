//! Shared HTTP adapter state.
//!
//! HTTP handlers accept this state via `actix_web::web::Data` so they only
//! depend on domain services and ports and remain testable without I/O.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::ports::TokenVerifier;
use crate::domain::{AdminService, CatalogService};

/// Per-endpoint-class request deadlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Whole-catalog fetches.
    pub catalog: Duration,
    /// Single-key and batch lookups.
    pub lookup: Duration,
    /// Admin mutations.
    pub admin: Duration,
    /// Health probes.
    pub health: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            catalog: Duration::from_secs(10),
            lookup: Duration::from_secs(5),
            admin: Duration::from_secs(15),
            health: Duration::from_secs(2),
        }
    }
}

/// Dependency bundle for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    pub catalog: Arc<CatalogService>,
    pub admin: Arc<AdminService>,
    pub verifier: Arc<dyn TokenVerifier>,
    pub admin_roles: Arc<HashSet<String>>,
    pub timeouts: Timeouts,
}

impl HttpState {
    /// Construct state from its parts.
    pub fn new(
        catalog: Arc<CatalogService>,
        admin: Arc<AdminService>,
        verifier: Arc<dyn TokenVerifier>,
        admin_roles: HashSet<String>,
        timeouts: Timeouts,
    ) -> Self {
        Self {
            catalog,
            admin,
            verifier,
            admin_roles: Arc::new(admin_roles),
            timeouts,
        }
    }
}
