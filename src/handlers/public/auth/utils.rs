// handlers/public/auth/utils.rs - Shared helpers for token acquisition

use axum::http::{header, HeaderValue};
use axum::response::{IntoResponse, Response};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::Collection;
use serde::{Deserialize, Serialize};

use crate::auth::{issue_token, Claims, Role};
use crate::database::connection::cache_key;
use crate::database::models::Account;
use crate::error::ApiError;
use crate::middleware::ApiResponse;
use crate::state::AppState;

pub const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct Session {
    pub token: String,
    pub identity: String,
    pub role: Role,
    pub expires_in: i64,
}

/// Normalized email, or 400 when it cannot serve as a tenant identity.
pub fn normalize_email(email: &str) -> Result<String, ApiError> {
    let email = cache_key(email).map_err(|_| ApiError::bad_request("email is required"))?;
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(ApiError::bad_request("email must be a valid address")),
    }
}

/// The `Cuenta` collection on the global directory connection.
pub async fn accounts(state: &AppState) -> Result<Collection<Account>, ApiError> {
    let connection = state.global.connect().await?;
    if !connection.is_ready() {
        return Err(ApiError::service_unavailable("Account directory temporarily unavailable"));
    }
    let model = state.global.registrar().get_model(&connection, "Cuenta").await?;
    Ok(model.typed::<Account>()?)
}

/// bcrypt is deliberately slow; keep it off the async workers.
pub async fn run_blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await.map_err(|e| {
        tracing::error!(error = %e, "Password task failed");
        ApiError::internal_server_error("Authentication is temporarily unavailable")
    })
}

pub fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write)) if write.code == 11000
    )
}

/// Issue a token for `account`, returned in the body and as the auth cookie.
pub fn session_response(state: &AppState, account: &Account, status: axum::http::StatusCode) -> Result<Response, ApiError> {
    let security = &state.config.security;
    let ttl = security.jwt_ttl();
    let claims = Claims::new(&account.email, account.role, ttl)?;
    let token = issue_token(&security.jwt_secret, &claims)?;

    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        security.auth_cookie,
        token,
        ttl.num_seconds()
    );
    if state.config.is_production() {
        cookie.push_str("; Secure");
    }
    let cookie = HeaderValue::from_str(&cookie)
        .map_err(|_| ApiError::internal_server_error("Failed to build session cookie"))?;

    let session = Session {
        token,
        identity: account.email.clone(),
        role: account.role,
        expires_in: ttl.num_seconds(),
    };
    let mut response = ApiResponse::with_status(session, status).into_response();
    response.headers_mut().insert(header::SET_COOKIE, cookie);
    Ok(response)
}
