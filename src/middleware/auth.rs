use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use crate::auth::{verify_token, AuthError, AuthenticatedPrincipal};
use crate::config::SecurityConfig;
use crate::error::ApiError;
use crate::state::AppState;

/// Authenticate the request and make sure the tenant connection is ready
/// before the wrapped handler runs.
///
/// The handler receives the principal through request extensions and fetches
/// its own connection via `connect_for_tenant` (a cache hit by then).
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let security = &state.config.security;

    let token = extract_token(request.headers(), security).ok_or(AuthError::MissingToken)?;
    let principal = verify_token(&security.jwt_secret, &token, Utc::now())?;

    let connection = state.connections.connect_for_tenant(&principal.identity).await?;
    if !connection.is_ready() {
        tracing::error!(tenant = %principal.identity, state = ?connection.ready_state(), "Tenant connection not ready");
        return Err(ApiError::service_unavailable("Database temporarily unavailable"));
    }

    tracing::debug!(tenant = %principal.identity, role = principal.role.as_str(), "Request authenticated");
    request.extensions_mut().insert(principal);

    Ok(next.run(request).await)
}

/// Reject principals without the admin role. Layer after [`require_auth`].
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    match request.extensions().get::<AuthenticatedPrincipal>() {
        Some(principal) if principal.is_admin() => Ok(next.run(request).await),
        Some(principal) => {
            tracing::warn!(tenant = %principal.identity, "Admin route refused for non-admin");
            Err(ApiError::forbidden("Administrator access required"))
        }
        None => Err(AuthError::MissingToken.into()),
    }
}

/// Find the token: bearer header, then cookie, then the upstream gateway header.
pub fn extract_token(headers: &HeaderMap, security: &SecurityConfig) -> Option<String> {
    bearer_token(headers)
        .or_else(|| cookie_token(headers, &security.auth_cookie))
        .or_else(|| upstream_token(headers, &security.upstream_token_header))
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    non_empty(token)
}

fn cookie_token(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .and_then(|(_, raw)| non_empty(&decode_cookie_value(raw)))
}

fn upstream_token(headers: &HeaderMap, name: &str) -> Option<String> {
    let value = headers.get(name)?.to_str().ok()?;
    non_empty(value)
}

/// Percent-decode a cookie value. `+` is kept as-is; cookies are not form data.
fn decode_cookie_value(raw: &str) -> String {
    let escaped = raw.replace('+', "%2B");
    url::form_urlencoded::parse(format!("v={}", escaped).as_bytes())
        .next()
        .map(|(_, value)| value.into_owned())
        .unwrap_or_default()
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn security() -> SecurityConfig {
        crate::config::AppConfig::development().security
    }

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn bearer_header_wins() {
        let h = headers(&[
            ("authorization", "Bearer from-header"),
            ("cookie", "token=from-cookie"),
            ("x-auth-token", "from-upstream"),
        ]);
        assert_eq!(extract_token(&h, &security()).as_deref(), Some("from-header"));
    }

    #[test]
    fn cookie_is_second() {
        let h = headers(&[("cookie", "theme=dark; token=from-cookie"), ("x-auth-token", "from-upstream")]);
        assert_eq!(extract_token(&h, &security()).as_deref(), Some("from-cookie"));
    }

    #[test]
    fn upstream_header_is_last() {
        let h = headers(&[("x-auth-token", "from-upstream")]);
        assert_eq!(extract_token(&h, &security()).as_deref(), Some("from-upstream"));
    }

    #[test]
    fn cookie_value_is_url_decoded() {
        let h = headers(&[("cookie", "token=abc%2Edef%3D; other=1")]);
        assert_eq!(extract_token(&h, &security()).as_deref(), Some("abc.def="));

        let h = headers(&[("cookie", "token=a+b")]);
        assert_eq!(extract_token(&h, &security()).as_deref(), Some("a+b"));
    }

    #[test]
    fn unusable_locations_fall_through() {
        // Non-bearer scheme and empty values do not count as a token
        let h = headers(&[
            ("authorization", "Basic dXNlcjpwYXNz"),
            ("cookie", "token="),
            ("x-auth-token", "from-upstream"),
        ]);
        assert_eq!(extract_token(&h, &security()).as_deref(), Some("from-upstream"));

        let h = headers(&[("authorization", "Bearer   ")]);
        assert_eq!(extract_token(&h, &security()), None);
    }

    #[test]
    fn no_token_anywhere() {
        let h = headers(&[("cookie", "session=xyz")]);
        assert_eq!(extract_token(&h, &security()), None);
        assert_eq!(extract_token(&HeaderMap::new(), &security()), None);
    }
}
