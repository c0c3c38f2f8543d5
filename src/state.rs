use std::sync::Arc;

use crate::config::AppConfig;
use crate::database::{ConnectionManager, Connector, GlobalConnector, MongoConnector};

/// Composition root shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub connections: ConnectionManager,
    pub global: GlobalConnector,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, connector: Arc<dyn Connector>) -> Self {
        let connections = ConnectionManager::new(&config, connector.clone());
        let global = GlobalConnector::new(&config, connector);
        Self {
            config,
            connections,
            global,
        }
    }

    /// State backed by the MongoDB driver.
    pub fn from_config(config: Arc<AppConfig>) -> Self {
        let connector = Arc::new(MongoConnector::new(&config.database));
        Self::new(config, connector)
    }

    /// Tear down every cached connection.
    pub async fn shutdown(&self) {
        self.connections.close_all().await;
        self.global.close().await;
    }
}
