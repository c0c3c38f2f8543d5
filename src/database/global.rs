use futures::FutureExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::cache::{ConnectionRecord, PendingConnection};
use super::connection::{open_with_timeout, tenant_uri, ConnectTarget, Connection, Connector};
use super::error::DatabaseError;
use super::manager::{retire, status_of, ConnectionStatus};
use super::models::ModelRegistrar;
use crate::config::AppConfig;

/// Cache key reported for the global slot in diagnostics.
pub const GLOBAL_KEY: &str = "__global__";

/// Single-slot connector for the shared, non-tenant account directory.
///
/// Same policy as [`ConnectionManager`](super::ConnectionManager): coalesced
/// establishment, failures reset the slot, missing configuration degrades to
/// a sentinel in production and fails fast elsewhere.
#[derive(Clone)]
pub struct GlobalConnector {
    slot: Arc<Mutex<ConnectionRecord>>,
    connector: Arc<dyn Connector>,
    base_uri: Option<String>,
    database_name: String,
    production: bool,
    establish_timeout: Duration,
    attempts: Arc<AtomicU64>,
}

impl GlobalConnector {
    pub fn new(config: &AppConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            slot: Arc::new(Mutex::new(ConnectionRecord::default())),
            connector,
            base_uri: config.database.uri.clone(),
            database_name: config.database.global_database.clone(),
            production: config.is_production(),
            establish_timeout: config.database.establish_timeout(),
            attempts: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn registrar(&self) -> ModelRegistrar {
        ModelRegistrar::global()
    }

    pub async fn connect(&self) -> Result<Arc<Connection>, DatabaseError> {
        let Some(base_uri) = self.base_uri.clone() else {
            if self.production {
                warn!("MONGODB_URI not configured, returning uninitialized global connection");
                return Ok(Arc::new(Connection::uninitialized(GLOBAL_KEY)));
            }
            return Err(DatabaseError::ConfigurationMissing("MONGODB_URI"));
        };

        let (pending, discarded) = {
            let mut record = self.slot.lock().await;
            let mut discarded = None;
            if let Some(connection) = &record.connection {
                if connection.ready_state().is_usable() {
                    return Ok(connection.clone());
                }
                discarded = record.connection.take();
            }
            let pending = match &record.pending {
                Some(pending) => pending.clone(),
                None => {
                    let attempt = self.attempts.fetch_add(1, Ordering::Relaxed) + 1;
                    let pending = self.spawn_establish(attempt, base_uri);
                    record.pending = Some(pending.clone());
                    record.attempt = attempt;
                    pending
                }
            };
            (pending, discarded)
        };

        if let Some(connection) = discarded {
            warn!(state = ?connection.ready_state(), "Discarding dead global connection");
            retire(connection);
        }
        pending.await
    }

    fn spawn_establish(&self, attempt: u64, base_uri: String) -> PendingConnection {
        let connector = self.clone();
        let handle = tokio::spawn(async move {
            let result = connector.establish(&base_uri).await;
            connector.settle(attempt, &result).await;
            result
        });

        let connector = self.clone();
        async move {
            let result = handle.await.unwrap_or_else(|_| {
                Err(DatabaseError::ConnectionFailed {
                    key: GLOBAL_KEY.to_string(),
                    message: "connection task aborted".to_string(),
                })
            });
            if result.is_err() {
                connector.settle(attempt, &result).await;
            }
            result
        }
        .boxed()
        .shared()
    }

    async fn establish(&self, base_uri: &str) -> Result<Arc<Connection>, DatabaseError> {
        let target = ConnectTarget {
            key: GLOBAL_KEY.to_string(),
            uri: tenant_uri(base_uri, &self.database_name)?,
            database_name: self.database_name.clone(),
        };
        info!(database = %self.database_name, "Opening global connection");
        let connection =
            Arc::new(open_with_timeout(self.connector.as_ref(), &target, self.establish_timeout).await?);
        self.registrar().register_all(&connection).await;
        // Always on: account uniqueness depends on the email index
        if let Err(e) = self.registrar().sync_indexes(&connection).await {
            connection.disconnect().await;
            return Err(e);
        }
        Ok(connection)
    }

    async fn settle(&self, attempt: u64, result: &Result<Arc<Connection>, DatabaseError>) {
        let mut record = self.slot.lock().await;
        if record.attempt != attempt || record.pending.is_none() {
            return;
        }
        record.pending = None;
        record.connection = result.as_ref().ok().cloned();
        if let Err(e) = result {
            warn!(error = %e, "Global connection failed");
        }
    }

    pub async fn close(&self) {
        let record = std::mem::take(&mut *self.slot.lock().await);
        if let Some(connection) = record.connection {
            connection.disconnect().await;
        }
    }

    pub async fn status(&self) -> ConnectionStatus {
        let record = self.slot.lock().await.clone();
        status_of(GLOBAL_KEY.to_string(), &record).await
    }
}
