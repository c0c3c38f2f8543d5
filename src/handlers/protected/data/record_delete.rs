// handlers/protected/data/record_delete.rs - DELETE /api/data/:model/:id handler

use axum::{
    extract::{Path, State},
    Extension,
};
use serde_json::{json, Value};

use super::utils::{parse_id, tenant_collection};
use crate::auth::AuthenticatedPrincipal;
use crate::database::models::by_id;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

/// DELETE /api/data/:model/:id - hard delete
pub async fn record_delete(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthenticatedPrincipal>,
    Path((model, id)): Path<(String, String)>,
) -> ApiResult<Value> {
    let id = parse_id(&id)?;
    let collection = tenant_collection(&state, &principal, &model).await?;

    let result = collection.delete_one(by_id(id), None).await?;
    if result.deleted_count == 0 {
        return Err(ApiError::not_found(format!("{} {} not found", model, id)));
    }

    tracing::debug!(tenant = %principal.identity, model = %model, id = %id, "Document deleted");
    Ok(ApiResponse::success(json!({ "deleted": id.to_hex() })))
}
