use axum::{extract::State, response::Json};
use serde::Serialize;

use super::ApiResponse;
use crate::db;
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub database: bool,
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<ApiResponse<HealthStatus>> {
    let database = db::ping(&state.db).await;
    let status = if database { "healthy" } else { "degraded" };

    Json(ApiResponse::success(HealthStatus {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database,
    }))
}
