//! Port for service discovery registration.
//!
//! The lifecycle calls `register` after the listener binds and `deregister`
//! during graceful shutdown; everything else about discovery is external.

use async_trait::async_trait;

use super::define_port_error;

define_port_error! {
    /// Errors surfaced by registry adapters.
    pub enum RegistryError {
        /// The discovery backend rejected or dropped the call.
        Backend { message: String } => "registry call failed: {message}",
    }
}

/// What the service announces to discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRegistration {
    pub name: String,
    pub host: String,
    pub port: u16,
}

/// Port registering the service with discovery.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Registry: Send + Sync {
    /// Announce the service.
    async fn register(&self, registration: &ServiceRegistration) -> Result<(), RegistryError>;

    /// Withdraw the announcement.
    async fn deregister(&self, registration: &ServiceRegistration) -> Result<(), RegistryError>;
}

/// No-op registry for deployments without discovery.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRegistry;

#[async_trait]
impl Registry for NoopRegistry {
    async fn register(&self, _registration: &ServiceRegistration) -> Result<(), RegistryError> {
        Ok(())
    }

    async fn deregister(&self, _registration: &ServiceRegistration) -> Result<(), RegistryError> {
        Ok(())
    }
}
