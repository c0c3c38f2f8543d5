use bson::oid::ObjectId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{IndexSpec, ModelDefinition};
use crate::auth::Role;

/// Models bound on the global account directory connection.
pub static GLOBAL_MODELS: &[ModelDefinition] = &[ModelDefinition {
    name: "Cuenta",
    collection: "cuentas",
    indexes: &[IndexSpec { keys: &[("email", 1)], unique: true }],
}];

/// Sign-in record in the global directory. The email doubles as the tenant identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub email: String,
    /// bcrypt hash, salt included.
    #[serde(rename = "passwordHash")]
    pub password_hash: String,
    pub role: Role,
    #[serde(rename = "createdAt", with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}
