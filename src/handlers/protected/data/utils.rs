use bson::{oid::ObjectId, Document};
use mongodb::Collection;
use serde_json::Value;

use crate::auth::AuthenticatedPrincipal;
use crate::error::ApiError;
use crate::state::AppState;

/// Collection for `model` on the principal's tenant connection.
pub(super) async fn tenant_collection(
    state: &AppState,
    principal: &AuthenticatedPrincipal,
    model: &str,
) -> Result<Collection<Document>, ApiError> {
    let connection = state.connections.connect_for_tenant(&principal.identity).await?;
    let model = state.connections.registrar().get_model(&connection, model).await?;
    Ok(model.collection()?)
}

pub(super) fn parse_id(id: &str) -> Result<ObjectId, ApiError> {
    ObjectId::parse_str(id).map_err(|_| ApiError::bad_request(format!("'{}' is not a valid document id", id)))
}

/// Relaxed extended JSON, so ids render as `{"$oid": "..."}`.
pub(super) fn to_json(document: Document) -> Value {
    bson::Bson::Document(document).into_relaxed_extjson()
}
