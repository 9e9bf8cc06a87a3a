//! Liveness endpoint

use axum::{extract::State, Json};
use serde::Serialize;
use sqlx::PgPool;

use crate::db;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
    pub version: String,
}

/// GET /health - Service and database liveness
pub async fn health_check(State(pool): State<PgPool>) -> Json<HealthResponse> {
    let database = match db::check_health(&pool).await {
        Ok(()) => "connected".to_string(),
        Err(e) => format!("error: {}", e),
    };

    let status = if database == "connected" {
        "healthy"
    } else {
        "unhealthy"
    };

    Json(HealthResponse {
        status: status.to_string(),
        database,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
