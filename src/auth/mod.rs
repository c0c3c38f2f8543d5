use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Member,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Member => "member",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "member" => Ok(Role::Member),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// Claims written into issued tokens.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    /// Claims expiring `ttl` from now. Fails instead of overflowing the clock.
    pub fn new(identity: &str, role: Role, ttl: Duration) -> Result<Self, AuthError> {
        let now = Utc::now();
        let exp = now.checked_add_signed(ttl).ok_or(AuthError::LifetimeOutOfRange)?;
        Ok(Self {
            sub: identity.to_string(),
            role,
            exp: exp.timestamp(),
            iat: now.timestamp(),
        })
    }
}

/// Claims as read back from a token; every field optional so that a missing
/// field is reported as a malformed payload rather than a decoding failure.
#[derive(Debug, Deserialize)]
struct RawClaims {
    sub: Option<String>,
    role: Option<String>,
    exp: Option<i64>,
}

/// Identity derived from a verified token. Rebuilt on every request.
#[derive(Debug, Clone, Serialize)]
pub struct AuthenticatedPrincipal {
    pub identity: String,
    pub role: Role,
    pub expiry: DateTime<Utc>,
}

impl AuthenticatedPrincipal {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no token in authorization header, cookie or upstream header")]
    MissingToken,

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("token expired")]
    ExpiredToken,

    #[error("malformed token payload: {0}")]
    MalformedPayload(String),

    #[error("JWT secret not configured")]
    SecretNotConfigured,

    #[error("token lifetime out of range")]
    LifetimeOutOfRange,

    #[error("password hashing failed: {0}")]
    PasswordHash(String),
}

pub fn issue_token(secret: &str, claims: &Claims) -> Result<String, AuthError> {
    if secret.is_empty() {
        return Err(AuthError::SecretNotConfigured);
    }
    let key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::new(Algorithm::HS256), claims, &key)
        .map_err(|e| AuthError::InvalidToken(e.to_string()))
}

/// Verify signature and expiry, then build the principal.
///
/// The library's expiry check runs with zero leeway, and `exp <= now` is
/// checked again against the caller's clock; both must pass.
pub fn verify_token(secret: &str, token: &str, now: DateTime<Utc>) -> Result<AuthenticatedPrincipal, AuthError> {
    if secret.is_empty() {
        return Err(AuthError::SecretNotConfigured);
    }

    // Header problems are plain invalid tokens; JSON errors past this point
    // come from the claims
    decode_header(token).map_err(|e| AuthError::InvalidToken(e.to_string()))?;

    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.validate_exp = true;
    validation.set_required_spec_claims(&["exp"]);

    let key = DecodingKey::from_secret(secret.as_bytes());
    let data = decode::<RawClaims>(token, &key, &validation).map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
        ErrorKind::MissingRequiredClaim(claim) => {
            AuthError::MalformedPayload(format!("missing claim '{}'", claim))
        }
        ErrorKind::Json(inner) => AuthError::MalformedPayload(inner.to_string()),
        _ => AuthError::InvalidToken(e.to_string()),
    })?;
    let claims = data.claims;

    let exp = claims
        .exp
        .ok_or_else(|| AuthError::MalformedPayload("missing claim 'exp'".to_string()))?;
    if exp <= now.timestamp() {
        return Err(AuthError::ExpiredToken);
    }
    let expiry = Utc
        .timestamp_opt(exp, 0)
        .single()
        .ok_or_else(|| AuthError::MalformedPayload(format!("exp out of range: {}", exp)))?;

    let identity = claims.sub.unwrap_or_default().trim().to_string();
    if identity.is_empty() {
        return Err(AuthError::MalformedPayload("missing subject".to_string()));
    }

    let role = match claims.role.as_deref() {
        None => Role::Member,
        Some(role) => role.parse().map_err(AuthError::MalformedPayload)?,
    };

    Ok(AuthenticatedPrincipal { identity, role, expiry })
}

/// bcrypt hash of a password; the salt is embedded in the result.
pub fn hash_password(password: &str, cost: u32) -> Result<String, AuthError> {
    bcrypt::hash(password, cost).map_err(|e| AuthError::PasswordHash(e.to_string()))
}

/// Check a password against a stored bcrypt hash. A hash that cannot be
/// parsed never verifies.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match bcrypt::verify(password, hash) {
        Ok(matches) => matches,
        Err(e) => {
            tracing::warn!(error = %e, "Stored password hash is unreadable");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SECRET: &str = "test-secret";

    fn sign(payload: serde_json::Value) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            &payload,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn issued_token_verifies() {
        let claims = Claims::new("alice@example.com", Role::Admin, Duration::hours(1)).unwrap();
        let token = issue_token(SECRET, &claims).unwrap();

        let principal = verify_token(SECRET, &token, Utc::now()).unwrap();
        assert_eq!(principal.identity, "alice@example.com");
        assert_eq!(principal.role, Role::Admin);
        assert_eq!(principal.expiry.timestamp(), claims.exp);
    }

    #[test]
    fn expiry_is_checked_even_when_signature_check_passes() {
        // Valid for the library (exp is in the future by wall clock) ...
        let exp = Utc::now().timestamp() + 30;
        let token = sign(json!({ "sub": "alice@example.com", "role": "member", "exp": exp }));
        assert!(verify_token(SECRET, &token, Utc::now()).is_ok());

        // ... but rejected once the verifying clock reaches exp
        let at_expiry = Utc.timestamp_opt(exp, 0).unwrap();
        assert!(matches!(verify_token(SECRET, &token, at_expiry), Err(AuthError::ExpiredToken)));
    }

    #[test]
    fn past_expiry_is_rejected_by_both_checks() {
        let token = sign(json!({ "sub": "alice@example.com", "exp": Utc::now().timestamp() - 10 }));
        assert!(matches!(verify_token(SECRET, &token, Utc::now()), Err(AuthError::ExpiredToken)));
    }

    #[test]
    fn wrong_secret_is_invalid() {
        let claims = Claims::new("a@b.c", Role::Member, Duration::hours(1)).unwrap();
        let token = issue_token("other-secret", &claims).unwrap();
        assert!(matches!(verify_token(SECRET, &token, Utc::now()), Err(AuthError::InvalidToken(_))));
        assert!(matches!(verify_token(SECRET, "not-a-jwt", Utc::now()), Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn payload_problems_are_malformed() {
        let exp = Utc::now().timestamp() + 60;

        let no_sub = sign(json!({ "role": "member", "exp": exp }));
        assert!(matches!(verify_token(SECRET, &no_sub, Utc::now()), Err(AuthError::MalformedPayload(_))));

        let bad_role = sign(json!({ "sub": "a@b.c", "role": "root", "exp": exp }));
        assert!(matches!(verify_token(SECRET, &bad_role, Utc::now()), Err(AuthError::MalformedPayload(_))));

        let no_exp = sign(json!({ "sub": "a@b.c" }));
        assert!(matches!(verify_token(SECRET, &no_exp, Utc::now()), Err(AuthError::MalformedPayload(_))));
    }

    #[test]
    fn missing_role_defaults_to_member() {
        let token = sign(json!({ "sub": "a@b.c", "exp": Utc::now().timestamp() + 60 }));
        assert_eq!(verify_token(SECRET, &token, Utc::now()).unwrap().role, Role::Member);
    }

    #[test]
    fn empty_secret_is_refused() {
        let claims = Claims::new("a@b.c", Role::Member, Duration::hours(1)).unwrap();
        assert!(matches!(issue_token("", &claims), Err(AuthError::SecretNotConfigured)));
        assert!(matches!(verify_token("", "x.y.z", Utc::now()), Err(AuthError::SecretNotConfigured)));
    }

    #[test]
    fn password_hashing() {
        let hash = hash_password("hunter2", crate::config::BCRYPT_MIN_COST).unwrap();
        assert!(hash.starts_with("$2"));
        assert!(!hash.contains("hunter2"));
        assert!(verify_password("hunter2", &hash));
        assert!(!verify_password("hunter3", &hash));

        // Salted: the same password hashes differently each time
        assert_ne!(hash, hash_password("hunter2", crate::config::BCRYPT_MIN_COST).unwrap());
        assert!(!verify_password("hunter2", "not-a-bcrypt-hash"));
    }

    #[test]
    fn oversized_lifetime_is_an_error() {
        let huge = Duration::milliseconds(i64::MAX);
        assert!(matches!(
            Claims::new("a@b.c", Role::Member, huge),
            Err(AuthError::LifetimeOutOfRange)
        ));
    }
}
