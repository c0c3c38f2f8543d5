pub mod cache;
pub mod connection;
pub mod error;
pub mod global;
pub mod manager;
pub mod models;

pub use cache::{ConnectionCache, ConnectionRecord, PendingConnection};
pub use connection::{cache_key, ConnectTarget, Connection, Connector, MongoConnector, ReadyState};
pub use error::DatabaseError;
pub use global::{GlobalConnector, GLOBAL_KEY};
pub use manager::{ConnectionManager, ConnectionStatus};
pub use models::{Model, ModelRegistrar};
