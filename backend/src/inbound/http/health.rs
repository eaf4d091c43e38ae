//! Health endpoint for orchestration and load balancers.
//!
//! ```text
//! GET /health
//! ```
//!
//! Unauthenticated by design. Always answers 200 with the component
//! breakdown; a degraded cache tier is reported in the body, never as a
//! request failure.

use actix_web::{HttpResponse, get, web};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{ComponentHealth, HealthReport};
use crate::inbound::http::state::HttpState;

/// Health payload: overall status plus per-dependency detail.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// `ok` when every enabled dependency is up, `degraded` otherwise.
    #[schema(example = "ok")]
    pub status: String,
    #[schema(value_type = String, example = "up")]
    pub store: ComponentHealth,
    #[schema(value_type = String, example = "up")]
    pub memory_cache: ComponentHealth,
    #[schema(value_type = String, example = "up")]
    pub distributed_cache: ComponentHealth,
}

impl From<HealthReport> for HealthResponse {
    fn from(report: HealthReport) -> Self {
        Self {
            status: if report.healthy() { "ok" } else { "degraded" }.to_owned(),
            store: report.store,
            memory_cache: report.memory_cache,
            distributed_cache: report.distributed_cache,
        }
    }
}

/// Probe store and cache tier liveness.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Component health", body = HealthResponse)),
    tags = ["health"],
    operation_id = "health",
    security([])
)]
#[get("/health")]
pub async fn health(state: web::Data<HttpState>) -> HttpResponse {
    let report = match tokio::time::timeout(state.timeouts.health, state.catalog.health()).await
    {
        Ok(report) => report,
        Err(_) => HealthReport {
            store: ComponentHealth::Down,
            memory_cache: ComponentHealth::Up,
            distributed_cache: ComponentHealth::Degraded,
        },
    };
    HttpResponse::Ok().json(HealthResponse::from(report))
}
