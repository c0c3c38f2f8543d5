// handlers/protected/data/record_get.rs - GET /api/data/:model/:id handler

use axum::{
    extract::{Path, State},
    Extension,
};
use serde_json::Value;

use super::utils::{parse_id, tenant_collection, to_json};
use crate::auth::AuthenticatedPrincipal;
use crate::database::models::by_id;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

/// GET /api/data/:model/:id - show single document by id
pub async fn record_get(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthenticatedPrincipal>,
    Path((model, id)): Path<(String, String)>,
) -> ApiResult<Value> {
    let id = parse_id(&id)?;
    let collection = tenant_collection(&state, &principal, &model).await?;

    match collection.find_one(by_id(id), None).await? {
        Some(document) => Ok(ApiResponse::success(to_json(document))),
        None => Err(ApiError::not_found(format!("{} {} not found", model, id))),
    }
}
