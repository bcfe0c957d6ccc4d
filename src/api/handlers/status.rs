//! Status and health check handlers.

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;

use crate::api::ApiState;

/// Health response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,

    /// Number of tenants loaded into memory.
    pub tenants: usize,

    /// Root of the tenant directories.
    pub data_dir: String,

    /// Whether updates validate before replacing the canonical file.
    pub staged_updates: bool,
}

/// Health check endpoint.
pub async fn health(State(state): State<Arc<ApiState>>) -> Json<HealthResponse> {
    let config = state.store.config();

    Json(HealthResponse {
        status: "ok".to_string(),
        tenants: state.store.tenants().await.len(),
        data_dir: config.data_dir.display().to_string(),
        staged_updates: config.staged_updates,
    })
}
