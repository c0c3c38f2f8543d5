use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Upper bound for token lifetimes (one year).
pub const MAX_JWT_EXPIRY_HOURS: u64 = 24 * 365;

/// Valid bcrypt cost range (mirrors bcrypt's private MIN_COST/MAX_COST).
pub const BCRYPT_MIN_COST: u32 = 4;
pub const BCRYPT_MAX_COST: u32 = 31;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Base MongoDB URI. The database path segment is replaced per tenant.
    pub uri: Option<String>,
    /// Database holding the global account directory.
    pub global_database: String,
    pub tenant_prefix: String,
    pub app_name: String,
    pub max_pool_size: u32,
    pub server_selection_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    /// Upper bound for a whole establishment attempt (open + ping).
    pub establish_timeout_ms: u64,
    pub auto_index: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: u16,
    pub enable_request_logging: bool,
    pub max_request_size_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    /// bcrypt work factor for stored passwords.
    pub password_cost: u32,
    pub auth_cookie: String,
    /// Header set by the upstream gateway once it has routed an authenticated request.
    pub upstream_token_header: String,
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    fn with_env_overrides(mut self) -> Self {
        // Database overrides
        if let Ok(v) = env::var("MONGODB_URI") {
            let v = v.trim();
            self.database.uri = (!v.is_empty()).then(|| v.to_string());
        }
        if let Ok(v) = env::var("GLOBAL_DB_NAME") {
            self.database.global_database = v;
        }
        if let Ok(v) = env::var("TENANT_DB_PREFIX") {
            self.database.tenant_prefix = v;
        }
        if let Ok(v) = env::var("DATABASE_MAX_POOL_SIZE") {
            self.database.max_pool_size = v.parse().unwrap_or(self.database.max_pool_size);
        }
        if let Ok(v) = env::var("DATABASE_SERVER_SELECTION_TIMEOUT_MS") {
            self.database.server_selection_timeout_ms =
                v.parse().unwrap_or(self.database.server_selection_timeout_ms);
        }
        if let Ok(v) = env::var("DATABASE_CONNECT_TIMEOUT_MS") {
            self.database.connect_timeout_ms = v.parse().unwrap_or(self.database.connect_timeout_ms);
        }
        if let Ok(v) = env::var("DATABASE_ESTABLISH_TIMEOUT_MS") {
            self.database.establish_timeout_ms =
                v.parse().unwrap_or(self.database.establish_timeout_ms);
        }
        if let Ok(v) = env::var("DATABASE_AUTO_INDEX") {
            self.database.auto_index = v.parse().unwrap_or(self.database.auto_index);
        }

        // API overrides
        if let Some(port) = env::var("API_PORT")
            .ok()
            .or_else(|| env::var("PORT").ok())
            .and_then(|s| s.parse::<u16>().ok())
        {
            self.api.port = port;
        }
        if let Ok(v) = env::var("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }
        if let Ok(v) = env::var("API_MAX_REQUEST_SIZE_BYTES") {
            self.api.max_request_size_bytes = v.parse().unwrap_or(self.api.max_request_size_bytes);
        }

        // Security overrides
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SECURITY_JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v
                .parse::<u64>()
                .map(|hours| hours.clamp(1, MAX_JWT_EXPIRY_HOURS))
                .unwrap_or(self.security.jwt_expiry_hours);
        }
        if let Ok(v) = env::var("SECURITY_PASSWORD_COST") {
            self.security.password_cost = v
                .parse::<u32>()
                .map(|cost| cost.clamp(BCRYPT_MIN_COST, BCRYPT_MAX_COST))
                .unwrap_or(self.security.password_cost);
        }
        if let Ok(v) = env::var("SECURITY_AUTH_COOKIE") {
            self.security.auth_cookie = v;
        }
        if let Ok(v) = env::var("SECURITY_UPSTREAM_TOKEN_HEADER") {
            self.security.upstream_token_header = v.to_ascii_lowercase();
        }
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }

        self
    }

    pub(crate) fn development() -> Self {
        Self {
            environment: Environment::Development,
            database: DatabaseConfig {
                uri: None,
                global_database: "global".to_string(),
                tenant_prefix: "tenant_".to_string(),
                app_name: "agro-api".to_string(),
                max_pool_size: 5,
                server_selection_timeout_ms: 5_000,
                connect_timeout_ms: 5_000,
                establish_timeout_ms: 10_000,
                auto_index: true,
            },
            api: ApiConfig {
                port: 3000,
                enable_request_logging: true,
                max_request_size_bytes: 10 * 1024 * 1024, // 10MB
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 24 * 7, // 1 week
                password_cost: 10,
                auth_cookie: "token".to_string(),
                upstream_token_header: "x-auth-token".to_string(),
                enable_cors: true,
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
            },
        }
    }

    pub(crate) fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            database: DatabaseConfig {
                uri: None,
                global_database: "global".to_string(),
                tenant_prefix: "tenant_".to_string(),
                app_name: "agro-api".to_string(),
                max_pool_size: 10,
                server_selection_timeout_ms: 5_000,
                connect_timeout_ms: 5_000,
                establish_timeout_ms: 10_000,
                auto_index: true,
            },
            api: ApiConfig {
                port: 3000,
                enable_request_logging: true,
                max_request_size_bytes: 5 * 1024 * 1024, // 5MB
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
                password_cost: bcrypt::DEFAULT_COST,
                auth_cookie: "token".to_string(),
                upstream_token_header: "x-auth-token".to_string(),
                enable_cors: true,
                cors_origins: vec!["https://staging.example.com".to_string()],
            },
        }
    }

    pub(crate) fn production() -> Self {
        Self {
            environment: Environment::Production,
            database: DatabaseConfig {
                uri: None,
                global_database: "global".to_string(),
                tenant_prefix: "tenant_".to_string(),
                app_name: "agro-api".to_string(),
                max_pool_size: 10,
                server_selection_timeout_ms: 5_000,
                connect_timeout_ms: 10_000,
                establish_timeout_ms: 15_000,
                auto_index: false,
            },
            api: ApiConfig {
                port: 3000,
                enable_request_logging: false,
                max_request_size_bytes: 2 * 1024 * 1024, // 2MB
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 4,
                password_cost: bcrypt::DEFAULT_COST,
                auth_cookie: "token".to_string(),
                upstream_token_header: "x-auth-token".to_string(),
                enable_cors: true,
                cors_origins: vec!["https://app.example.com".to_string()],
            },
        }
    }
}

impl DatabaseConfig {
    pub fn server_selection_timeout(&self) -> Duration {
        Duration::from_millis(self.server_selection_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn establish_timeout(&self) -> Duration {
        Duration::from_millis(self.establish_timeout_ms)
    }
}

impl SecurityConfig {
    /// Lifetime of issued tokens, bounded to [`MAX_JWT_EXPIRY_HOURS`].
    pub fn jwt_ttl(&self) -> chrono::Duration {
        let hours = self.jwt_expiry_hours.clamp(1, MAX_JWT_EXPIRY_HOURS);
        chrono::Duration::hours(hours as i64)
    }
}

// Global singleton config - only the binary entry point reads it; everything
// else receives an Arc<AppConfig> through AppState.
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

pub fn config() -> &'static AppConfig {
    &CONFIG
}
