// handlers/protected/auth/whoami.rs - GET /api/auth/whoami handler

use axum::{extract::State, Extension};
use serde_json::{json, Value};

use crate::auth::AuthenticatedPrincipal;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

/// The principal from the token plus the tenant connection it resolved to.
pub async fn whoami_get(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthenticatedPrincipal>,
) -> ApiResult<Value> {
    let connection = state.connections.connect_for_tenant(&principal.identity).await?;

    Ok(ApiResponse::success(json!({
        "identity": principal.identity,
        "role": principal.role,
        "expires_at": principal.expiry.to_rfc3339(),
        "tenant": {
            "database": connection.database_name(),
            "state": connection.ready_state(),
            "ready": connection.is_ready(),
            "models": connection.bound_model_names().await,
        }
    })))
}
