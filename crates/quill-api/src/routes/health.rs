use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::{error::ApiResult, state::AppState};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub services: HashMap<String, String>,
}

/// Health check endpoint
///
/// Returns the health status of the API and its storage
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    ),
    tag = "health"
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> ApiResult<Json<HealthResponse>> {
    let mut services = HashMap::new();

    let storage = match state.chat.list_conversations("_health_check").await {
        Ok(_) => "connected",
        Err(e) => {
            tracing::warn!(error = %e, "Storage health check failed");
            "disconnected"
        }
    };
    services.insert("storage".to_string(), storage.to_string());
    services.insert(
        "backend".to_string(),
        format!("{:?}", state.config.storage.backend).to_lowercase(),
    );

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        services,
    }))
}
