// handlers/protected/mod.rs - Protected handlers (JWT authentication required)
//
// Every route here sits behind `middleware::require_auth`, which verifies the
// token and waits for the tenant connection (models registered) before the
// handler runs. Handlers read the principal from request extensions.
pub mod auth; // /api/auth/*
pub mod data; // /api/data/*
