pub mod auth;
pub mod response;

pub use auth::{extract_token, require_admin, require_auth};
pub use response::{ApiResponse, ApiResult};
