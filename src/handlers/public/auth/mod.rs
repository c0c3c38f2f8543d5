// handlers/public/auth/mod.rs - Public authentication handlers
//
// Accounts live in the global directory database. The account email is the
// tenant identity carried in the token subject.
pub mod login;    // POST /auth/login
pub mod register; // POST /auth/register
mod utils;

pub use login::login_post;
pub use register::register_post;
