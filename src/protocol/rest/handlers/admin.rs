//! Admin Handlers
//!
//! Health check, liveness and connection statistics endpoints.

use std::sync::Arc;

use axum::{http::StatusCode, Extension, Json};

use crate::protocol::rest::dto::{ApiResponse, HealthDto, StatsDto};
use crate::protocol::rest::error::RestError;
use crate::protocol::Handler;

/// Health check endpoint. Reports `draining` once shutdown has begun.
pub async fn health(
    Extension(handler): Extension<Arc<Handler>>,
) -> Result<Json<ApiResponse<HealthDto>>, RestError> {
    let status = if handler.is_shutting_down() {
        "draining"
    } else {
        "healthy"
    };
    let health = HealthDto {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: handler.uptime_seconds(),
        active_connections: handler.connection_count(),
    };

    Ok(Json(ApiResponse::success(health)))
}

/// Liveness probe
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// Connection statistics endpoint
pub async fn stats(
    Extension(handler): Extension<Arc<Handler>>,
) -> Result<Json<ApiResponse<StatsDto>>, RestError> {
    let mut connection_ids = handler.registry().ids();
    connection_ids.sort();

    let stats = StatsDto {
        active_connections: connection_ids.len(),
        connection_ids,
        uptime_secs: handler.uptime_seconds(),
        shutting_down: handler.is_shutting_down(),
    };

    Ok(Json(ApiResponse::success(stats)))
}
