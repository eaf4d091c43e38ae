//! Shared helpers for the Diesel store adapter.
//!
//! Centralizes mapping from pool and Diesel errors to the store port's error
//! vocabulary: unique violations become `Conflict`, missing rows `NotFound`,
//! everything else a query or connection failure. Raw driver messages are
//! logged, never propagated into client-facing errors.

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use tracing::debug;

use crate::domain::ports::CatalogStoreError;

use super::pool::PoolError;

/// Map pool errors to the store port's connection failure.
pub fn map_pool_error(error: PoolError) -> CatalogStoreError {
    match error {
        PoolError::Checkout { message } | PoolError::Build { message } => {
            CatalogStoreError::connection(message)
        }
    }
}

/// Map Diesel errors to store port errors.
///
/// `what` names the entity for `NotFound`/`Conflict` phrasing, e.g.
/// "language code 'en'".
pub fn map_diesel_error(error: DieselError, what: &str) -> CatalogStoreError {
    match &error {
        DieselError::DatabaseError(kind, info) => {
            debug!(?kind, message = info.message(), what, "diesel operation failed");
        }
        other => debug!(error = %other, what, "diesel operation failed"),
    }

    match error {
        DieselError::NotFound => CatalogStoreError::not_found(what),
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
            CatalogStoreError::conflict(what)
        }
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, _) => {
            CatalogStoreError::connection("database connection error")
        }
        _ => CatalogStoreError::query("database error"),
    }
}

/// Collect row conversion results, mapping the first failure to a query
/// error.
pub fn collect_rows<T>(
    results: impl Iterator<Item = Result<T, String>>,
) -> Result<Vec<T>, CatalogStoreError> {
    results
        .collect::<Result<Vec<_>, _>>()
        .map_err(CatalogStoreError::query)
}

#[cfg(test)]
mod tests {
    //! Error mapping coverage.
    use super::{collect_rows, map_diesel_error, map_pool_error};
    use crate::domain::ports::CatalogStoreError;
    use crate::outbound::persistence::pool::PoolError;
    use diesel::result::Error as DieselError;
    use rstest::rstest;

    #[rstest]
    fn pool_errors_become_connection_failures() {
        let mapped = map_pool_error(PoolError::checkout("timed out"));
        assert_eq!(mapped, CatalogStoreError::connection("timed out"));
    }

    #[rstest]
    fn missing_rows_become_not_found() {
        let mapped = map_diesel_error(DieselError::NotFound, "language code 'xx'");
        assert_eq!(mapped, CatalogStoreError::not_found("language code 'xx'"));
    }

    #[rstest]
    fn conversion_failures_become_query_errors() {
        let rows: Vec<Result<u32, String>> = vec![Ok(1), Err("bad row".to_owned())];
        let err = collect_rows(rows.into_iter()).expect_err("conversion fails");
        assert_eq!(err, CatalogStoreError::query("bad row"));
    }
}
