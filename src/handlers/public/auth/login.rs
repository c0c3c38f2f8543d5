// handlers/public/auth/login.rs - POST /auth/login handler

use axum::{extract::State, http::StatusCode, response::Response, Json};
use bson::doc;

use super::utils::{accounts, normalize_email, run_blocking, session_response, Credentials};
use crate::auth::verify_password;
use crate::error::ApiError;
use crate::state::AppState;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// POST /auth/login - verify credentials against the global directory and
/// issue a token (body + cookie).
pub async fn login_post(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> Result<Response, ApiError> {
    let email = normalize_email(&credentials.email)?;
    let collection = accounts(&state).await?;

    let Some(account) = collection.find_one(doc! { "email": &email }, None).await? else {
        tracing::warn!(identity = %email, "Login rejected: no such account");
        return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
    };

    let password = credentials.password;
    let hash = account.password_hash.clone();
    if !run_blocking(move || verify_password(&password, &hash)).await? {
        tracing::warn!(identity = %email, "Login rejected: wrong password");
        return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
    }

    tracing::info!(identity = %account.email, "Login succeeded");
    session_response(&state, &account, StatusCode::OK)
}
