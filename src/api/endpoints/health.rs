//! Health check endpoint.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model_id: String,
    pub version: &'static str,
}

/// `GET /health` — liveness check.
pub async fn check(State(ctx): State<ApiContext>) -> Result<Json<HealthResponse>, ApiError> {
    // A failed open is the one condition worth reporting as unhealthy.
    ctx.open_db()?;

    Ok(Json(HealthResponse {
        status: "ok",
        model_id: ctx.inference.model_id().to_string(),
        version: crate::config::APP_VERSION,
    }))
}
