//! HTTP adapter mapping for domain errors and the response envelope.
//!
//! Purpose: keep the domain error type HTTP-agnostic while handlers return
//! consistent `{success, data?, error?}` envelopes and status codes. Store
//! and internal error messages are redacted before they reach the wire.

use std::future::Future;
use std::time::Duration;

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, HttpResponseBuilder, ResponseError};
use serde::Serialize;
use tracing::error;

use crate::domain::{Error, ErrorCode};

/// Convenient result alias for HTTP handlers.
pub type ApiResult<T> = Result<T, Error>;

/// Error half of the response envelope.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// Stable numeric code (1xxx validation, 2xxx store/cache, 3xxx auth,
    /// 5xxx internal).
    #[schema(example = 1001)]
    pub code: u16,
    #[schema(example = "language 'xx' not found")]
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<serde_json::Value>)]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    success: bool,
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct SuccessEnvelope<T: Serialize> {
    success: bool,
    data: T,
}

/// Wrap a payload in the success envelope with the given status.
pub fn envelope_response<T: Serialize>(mut builder: HttpResponseBuilder, data: T) -> HttpResponse {
    builder.json(SuccessEnvelope {
        success: true,
        data,
    })
}

/// Wrap a payload in a `200 OK` success envelope.
pub fn ok_envelope<T: Serialize>(data: T) -> HttpResponse {
    envelope_response(HttpResponse::Ok(), data)
}

/// Wrap a payload in a `201 Created` success envelope.
pub fn created_envelope<T: Serialize>(data: T) -> HttpResponse {
    envelope_response(HttpResponse::Created(), data)
}

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Unauthenticated => StatusCode::UNAUTHORIZED,
        ErrorCode::Forbidden => StatusCode::FORBIDDEN,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Conflict => StatusCode::CONFLICT,
        ErrorCode::Timeout => StatusCode::REQUEST_TIMEOUT,
        // 499 mirrors the de-facto "client closed request" status.
        ErrorCode::Canceled => StatusCode::from_u16(499).unwrap_or(StatusCode::REQUEST_TIMEOUT),
        ErrorCode::Store | ErrorCode::Cache | ErrorCode::Internal => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        status_for(self.code())
    }

    fn error_response(&self) -> HttpResponse {
        let redacted = self.redacted_for_clients();
        HttpResponse::build(self.status_code()).json(ErrorEnvelope {
            success: false,
            error: ErrorBody {
                code: redacted.code().wire_code(),
                message: redacted.message().to_owned(),
                details: redacted.details().cloned(),
            },
        })
    }
}

impl From<actix_web::Error> for Error {
    fn from(err: actix_web::Error) -> Self {
        // Do not leak framework details to clients.
        error!(error = %err, "actix error promoted to domain error");
        Self::internal("internal server error")
    }
}

/// Run a service call under the request's deadline.
///
/// Elapsing the deadline returns `Timeout` without leaving locks or builds
/// dangling: single-flight builds are detached and continue for remaining
/// waiters.
pub async fn with_deadline<T>(
    limit: Duration,
    what: &str,
    fut: impl Future<Output = Result<T, Error>>,
) -> Result<T, Error> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::timeout(format!(
            "{what} exceeded its {}s deadline",
            limit.as_secs()
        ))),
    }
}
