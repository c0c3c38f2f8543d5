// handlers/protected/data/schema_post.rs - POST /api/data/:model handler

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde_json::Value;

use super::utils::{tenant_collection, to_json};
use crate::auth::AuthenticatedPrincipal;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

/// POST /api/data/:model - insert one JSON object, returns it with its `_id`
pub async fn schema_post(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthenticatedPrincipal>,
    Path(model): Path<String>,
    Json(body): Json<Value>,
) -> ApiResult<Value> {
    let mut document = match bson::to_bson(&body) {
        Ok(bson::Bson::Document(document)) => document,
        _ => return Err(ApiError::bad_request("request body must be a JSON object")),
    };
    // Ids are always assigned by the database
    document.remove("_id");

    let collection = tenant_collection(&state, &principal, &model).await?;
    let inserted = collection.insert_one(&document, None).await?;
    document.insert("_id", inserted.inserted_id);

    tracing::debug!(tenant = %principal.identity, model = %model, "Document created");
    Ok(ApiResponse::created(to_json(document)))
}
