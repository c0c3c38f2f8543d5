// handlers/protected/data/schema_get.rs - GET /api/data/:model handler

use axum::{
    extract::{Path, Query, State},
    Extension,
};
use bson::doc;
use futures::TryStreamExt;
use mongodb::options::FindOptions;
use serde::Deserialize;
use serde_json::Value;

use super::utils::{tenant_collection, to_json};
use crate::auth::AuthenticatedPrincipal;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 500;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
    pub skip: Option<u64>,
}

/// GET /api/data/:model - newest documents first
pub async fn schema_get(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthenticatedPrincipal>,
    Path(model): Path<String>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<Value>> {
    let collection = tenant_collection(&state, &principal, &model).await?;

    let options = FindOptions::builder()
        .sort(doc! { "_id": -1 })
        .limit(query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT))
        .skip(query.skip)
        .build();
    let documents: Vec<_> = collection.find(None, options).await?.try_collect().await?;

    Ok(ApiResponse::success(documents.into_iter().map(to_json).collect()))
}
