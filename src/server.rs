use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::AppConfig;
use crate::handlers::{elevated, protected, public};
use crate::middleware::{require_admin, require_auth};
use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    let config = state.config.clone();

    let mut router = Router::new()
        // Public
        .route("/health", get(public::health_get))
        .merge(auth_public_routes())
        // Protected API
        .merge(api_routes(state.clone()))
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.api.max_request_size_bytes));

    if config.security.enable_cors {
        router = router.layer(cors_layer(&config));
    }
    if config.api.enable_request_logging {
        router = router.layer(TraceLayer::new_for_http());
    }
    router
}

fn auth_public_routes() -> Router<AppState> {
    use public::auth;

    Router::new()
        .route("/auth/register", post(auth::register_post))
        .route("/auth/login", post(auth::login_post))
}

fn api_routes(state: AppState) -> Router<AppState> {
    use protected::{auth, data};

    let admin = Router::new()
        .route("/api/admin/connections", get(elevated::connections_get))
        .route("/api/admin/connections/:key", delete(elevated::connection_delete))
        .route_layer(from_fn(require_admin));

    Router::new()
        .route("/api/auth/whoami", get(auth::whoami_get))
        .route("/api/data/:model", get(data::schema_get).post(data::schema_post))
        .route("/api/data/:model/:id", get(data::record_get).delete(data::record_delete))
        .merge(admin)
        // Runs before require_admin: route layers added later wrap earlier ones
        .route_layer(from_fn_with_state(state, require_auth))
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .security
        .cors_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    if origins.is_empty() {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(tower_http::cors::Any)
            .allow_headers(tower_http::cors::Any)
    }
}

/// Bind, serve until ctrl-c, then tear down every cached connection.
pub async fn serve(config: Arc<AppConfig>) -> anyhow::Result<()> {
    let state = AppState::from_config(config.clone());
    let app = app(state.clone());

    let bind_addr = format!("0.0.0.0:{}", config.api.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind {}: {}", bind_addr, e))?;

    tracing::info!(
        address = %bind_addr,
        environment = ?config.environment,
        "Agro API listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.shutdown().await;
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
