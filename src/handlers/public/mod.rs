// handlers/public/mod.rs - Public handlers (no authentication required)
//
// Token acquisition and liveness. These run against the global directory
// connection only; no tenant connection is ever opened from here.
pub mod auth;
pub mod health;

pub use health::health_get;
