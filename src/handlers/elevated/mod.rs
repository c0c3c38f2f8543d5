// handlers/elevated/mod.rs - Elevated handlers (admin role required)
//
// Layered behind `require_auth` and then `require_admin`.
pub mod connections; // /api/admin/connections

pub use connections::{connection_delete, connections_get};
