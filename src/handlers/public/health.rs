// handlers/public/health.rs - GET /health handler

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// Liveness plus a ping of the global directory. Tenant connections are only
/// counted, never opened.
pub async fn health_get(State(state): State<AppState>) -> Json<Value> {
    let global = match state.global.connect().await {
        Ok(connection) => match connection.ping().await {
            Ok(()) => "ok",
            Err(e) => {
                tracing::warn!(error = %e, "Global directory ping failed");
                "unreachable"
            }
        },
        Err(e) => {
            tracing::warn!(error = %e, "Global directory unavailable");
            "unavailable"
        }
    };
    let tenants = state.connections.status().await;

    Json(json!({
        "success": true,
        "data": {
            "status": if global == "ok" { "ok" } else { "degraded" },
            "version": env!("CARGO_PKG_VERSION"),
            "environment": state.config.environment,
            "global": global,
            "tenants": {
                "cached": tenants.len(),
                "pending": tenants.iter().filter(|s| s.pending).count(),
            }
        }
    }))
}
