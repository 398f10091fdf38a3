//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
    pub git_hash: String,
    /// Whether the store answered a trivial query
    pub database: bool,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(state.services.pool())
        .await
        .is_ok();

    Json(HealthResponse {
        status: if database { "ok" } else { "degraded" }.to_string(),
        module: "ddb-api".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: env!("GIT_HASH").to_string(),
        database,
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
