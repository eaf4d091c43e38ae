//! Diesel/PostgreSQL persistence adapter for the catalog store port.

mod diesel_catalog_store;
mod diesel_helpers;
mod models;
pub mod pool;
pub mod schema;

pub use diesel_catalog_store::DieselCatalogStore;
pub use pool::{DbPool, PoolConfig, PoolError};
