// handlers/protected/data/mod.rs - Document endpoints over registered models
//
// :model is a registered model name (`Cultivo`, `Tarea`, ...). Anything else
// is a 404 from the registrar.
pub mod record_delete; // DELETE /api/data/:model/:id
pub mod record_get;    // GET    /api/data/:model/:id
pub mod schema_get;    // GET    /api/data/:model
pub mod schema_post;   // POST   /api/data/:model
mod utils;

pub use record_delete::record_delete;
pub use record_get::record_get;
pub use schema_get::schema_get;
pub use schema_post::schema_post;
