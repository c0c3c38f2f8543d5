// handlers/public/auth/register.rs - POST /auth/register handler

use axum::{extract::State, http::StatusCode, response::Response, Json};
use bson::doc;
use serde::Deserialize;

use super::utils::{
    accounts, is_duplicate_key, normalize_email, run_blocking, session_response, MIN_PASSWORD_LENGTH,
};
use crate::auth::{hash_password, Role};
use crate::database::models::Account;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub role: Option<Role>,
}

/**
 * POST /auth/register - Create an account in the global directory
 *
 * Input: `{ "email": "...", "password": "...", "role": "member" }`
 * Output: 201 with the same session payload as login, plus the auth cookie.
 *
 * The tenant database itself is created lazily on the first authenticated
 * request for this identity.
 */
pub async fn register_post(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<Response, ApiError> {
    let email = normalize_email(&body.email)?;
    if body.password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::bad_request(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }

    let role = match body.role.unwrap_or(Role::Member) {
        Role::Admin if state.config.is_production() => {
            return Err(ApiError::forbidden("Administrator accounts cannot be self-registered"));
        }
        role => role,
    };

    let collection = accounts(&state).await?;
    if collection.find_one(doc! { "email": &email }, None).await?.is_some() {
        return Err(ApiError::conflict("An account with this email already exists"));
    }

    let cost = state.config.security.password_cost;
    let password = body.password;
    let password_hash = run_blocking(move || hash_password(&password, cost)).await??;

    let mut account = Account {
        id: None,
        password_hash,
        email,
        role,
        created_at: chrono::Utc::now(),
    };

    match collection.insert_one(&account, None).await {
        Ok(inserted) => account.id = inserted.inserted_id.as_object_id(),
        // Lost a race with a concurrent registration
        Err(e) if is_duplicate_key(&e) => {
            return Err(ApiError::conflict("An account with this email already exists"));
        }
        Err(e) => return Err(e.into()),
    }

    tracing::info!(identity = %account.email, role = account.role.as_str(), "Account registered");
    session_response(&state, &account, StatusCode::CREATED)
}
