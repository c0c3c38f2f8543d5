// handlers/protected/auth/mod.rs - Authenticated session endpoints
pub mod whoami; // GET /api/auth/whoami

pub use whoami::whoami_get;
