// handlers/elevated/connections.rs - Connection cache diagnostics

use axum::extract::{Path, State};
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

/// GET /api/admin/connections - every cached tenant entry plus the global slot
pub async fn connections_get(State(state): State<AppState>) -> ApiResult<Value> {
    let tenants = state.connections.status().await;
    let global = state.global.status().await;

    Ok(ApiResponse::success(json!({
        "global": global,
        "tenants": tenants,
    })))
}

/// DELETE /api/admin/connections/:key - shut down one tenant connection. The
/// next request for that tenant re-establishes it.
pub async fn connection_delete(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<Value> {
    if !state.connections.disconnect(&key).await? {
        return Err(ApiError::not_found(format!("No cached connection for '{}'", key)));
    }
    tracing::info!(tenant = %key, "Connection closed by administrator");
    Ok(ApiResponse::success(json!({ "disconnected": key })))
}
