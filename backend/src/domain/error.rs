//! Domain error representation shared across adapters.
//!
//! Keep this module free from HTTP or framework concerns so the same error
//! shape can be mapped by any adapter (HTTP, background workers, CLI).

use serde_json::Value;
use thiserror::Error as ThisError;

/// Stable machine-readable error code.
///
/// Wire codes fall in fixed domains: 1xxx validation/not-found/conflict,
/// 2xxx store/cache, 3xxx auth, 5xxx internal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorCode {
    /// The request is malformed or violates a data invariant.
    Validation,
    /// The requested entity or fingerprint does not exist.
    NotFound,
    /// A uniqueness constraint was violated (duplicate code, snapshot race).
    Conflict,
    /// The underlying store failed.
    Store,
    /// A cache tier failed and could not be recovered locally.
    Cache,
    /// Authentication failed or is missing.
    Unauthenticated,
    /// Authenticated but not permitted to perform this action.
    Forbidden,
    /// The request exceeded its deadline.
    Timeout,
    /// The request was cancelled by the caller.
    Canceled,
    /// An unexpected error occurred on the server.
    Internal,
}

impl ErrorCode {
    /// Numeric code carried in the response envelope.
    pub const fn wire_code(self) -> u16 {
        match self {
            Self::Validation => 1000,
            Self::NotFound => 1001,
            Self::Conflict => 1002,
            Self::Store => 2000,
            Self::Cache => 2001,
            Self::Unauthenticated => 3000,
            Self::Forbidden => 3001,
            Self::Internal => 5000,
            Self::Timeout => 5001,
            Self::Canceled => 5002,
        }
    }
}

/// Domain error payload consumed by adapters.
///
/// ## Invariants
/// - `message` must be non-empty once trimmed of whitespace.
#[derive(Debug, Clone, PartialEq, ThisError)]
#[error("{message}")]
pub struct Error {
    code: ErrorCode,
    message: String,
    details: Option<Value>,
}

/// Validation errors raised by [`Error`] constructors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorValidationError {
    EmptyMessage,
}

impl std::fmt::Display for ErrorValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyMessage => write!(f, "error message must not be empty"),
        }
    }
}

impl std::error::Error for ErrorValidationError {}

impl Error {
    /// Create a new error.
    ///
    /// # Panics
    /// Panics when the message is empty after trimming; use [`Self::try_new`]
    /// for fallible construction.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        match Self::try_new(code, message) {
            Ok(value) => value,
            Err(err) => panic!("error messages must satisfy validation: {err}"),
        }
    }

    /// Fallible constructor that validates the message content.
    pub fn try_new(
        code: ErrorCode,
        message: impl Into<String>,
    ) -> Result<Self, ErrorValidationError> {
        let message = message.into();
        if message.trim().is_empty() {
            return Err(ErrorValidationError::EmptyMessage);
        }
        Ok(Self {
            code,
            message,
            details: None,
        })
    }

    /// Stable machine-readable error code.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Human-readable message returned to clients.
    pub fn message(&self) -> &str {
        self.message.as_str()
    }

    /// Supplementary error details for clients.
    pub fn details(&self) -> Option<&Value> {
        self.details.as_ref()
    }

    /// Attach structured details to the error.
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Convenience constructor for [`ErrorCode::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Validation, message)
    }

    /// Convenience constructor for [`ErrorCode::NotFound`].
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    /// Convenience constructor for [`ErrorCode::Conflict`].
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Conflict, message)
    }

    /// Convenience constructor for [`ErrorCode::Store`].
    pub fn store(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Store, message)
    }

    /// Convenience constructor for [`ErrorCode::Cache`].
    pub fn cache(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Cache, message)
    }

    /// Convenience constructor for [`ErrorCode::Unauthenticated`].
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthenticated, message)
    }

    /// Convenience constructor for [`ErrorCode::Forbidden`].
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    /// Convenience constructor for [`ErrorCode::Timeout`].
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Timeout, message)
    }

    /// Convenience constructor for [`ErrorCode::Canceled`].
    pub fn canceled(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Canceled, message)
    }

    /// Convenience constructor for [`ErrorCode::Internal`].
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }

    /// Redact server-side details so the payload is safe to expose to clients.
    ///
    /// Store and internal errors keep their code but replace the message with
    /// a stable generic string and drop structured details; SQL text and stack
    /// fragments never cross the wire.
    pub fn redacted_for_clients(&self) -> Self {
        let replacement = match self.code {
            ErrorCode::Store => "storage failure",
            ErrorCode::Internal => "internal server error",
            _ => return self.clone(),
        };
        Self {
            code: self.code,
            message: replacement.to_owned(),
            details: None,
        }
    }
}
