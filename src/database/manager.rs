use futures::FutureExt;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::cache::{ConnectionCache, ConnectionRecord, PendingConnection};
use super::connection::{
    cache_key, open_with_timeout, tenant_database_name, tenant_uri, ConnectTarget, Connection,
    Connector, ReadyState,
};
use super::error::DatabaseError;
use super::models::ModelRegistrar;
use crate::config::AppConfig;

/// Settings the establisher needs, copied out of [`AppConfig`].
#[derive(Debug, Clone)]
pub(crate) struct EstablishSettings {
    pub base_uri: Option<String>,
    pub production: bool,
    pub tenant_prefix: String,
    pub establish_timeout: Duration,
    pub auto_index: bool,
}

impl EstablishSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            base_uri: config.database.uri.clone(),
            production: config.is_production(),
            tenant_prefix: config.database.tenant_prefix.clone(),
            establish_timeout: config.database.establish_timeout(),
            auto_index: config.database.auto_index,
        }
    }
}

/// Outcome of the locked check-and-install step. A dead connection taken out
/// of the record rides along so it can be shut down once the lock is released.
enum Lookup {
    Ready(Arc<Connection>),
    Pending {
        pending: PendingConnection,
        discarded: Option<Arc<Connection>>,
    },
}

/// Diagnostics view of one cache entry.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionStatus {
    pub key: String,
    pub database: Option<String>,
    pub state: Option<ReadyState>,
    pub pending: bool,
    pub models: Vec<String>,
}

/// Resolves tenant connections: reuse cached, await in-flight, or open new.
///
/// At most one establishment attempt per key runs at a time; concurrent
/// callers for the same key share its result.
#[derive(Clone)]
pub struct ConnectionManager {
    cache: Arc<ConnectionCache>,
    connector: Arc<dyn Connector>,
    registrar: ModelRegistrar,
    settings: Arc<EstablishSettings>,
    attempts: Arc<AtomicU64>,
}

impl ConnectionManager {
    pub fn new(config: &AppConfig, connector: Arc<dyn Connector>) -> Self {
        Self::with_cache(config, connector, Arc::new(ConnectionCache::new()))
    }

    pub fn with_cache(
        config: &AppConfig,
        connector: Arc<dyn Connector>,
        cache: Arc<ConnectionCache>,
    ) -> Self {
        Self {
            cache,
            connector,
            registrar: ModelRegistrar::tenant(),
            settings: Arc::new(EstablishSettings::from_config(config)),
            attempts: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn cache(&self) -> &Arc<ConnectionCache> {
        &self.cache
    }

    pub fn registrar(&self) -> ModelRegistrar {
        self.registrar
    }

    /// Get a ready connection for the tenant identified by `identity`.
    ///
    /// Without a configured base URI this fails fast outside production and
    /// returns an uncached [`ReadyState::Uninitialized`] sentinel in production.
    pub async fn connect_for_tenant(&self, identity: &str) -> Result<Arc<Connection>, DatabaseError> {
        let key = cache_key(identity)?;

        let Some(base_uri) = self.settings.base_uri.clone() else {
            if self.settings.production {
                warn!(tenant = %key, "MONGODB_URI not configured, returning uninitialized connection");
                return Ok(Arc::new(Connection::uninitialized(&key)));
            }
            return Err(DatabaseError::ConfigurationMissing("MONGODB_URI"));
        };

        let lookup = self
            .cache
            .update(&key, |record| {
                let mut discarded = None;
                if let Some(connection) = &record.connection {
                    let state = connection.ready_state();
                    if state.is_usable() {
                        return Lookup::Ready(connection.clone());
                    }
                    debug!(tenant = %key, ?state, "Discarding dead connection");
                    discarded = record.connection.take();
                }
                if let Some(pending) = &record.pending {
                    return Lookup::Pending {
                        pending: pending.clone(),
                        discarded,
                    };
                }

                // Install before any work starts so later callers find it
                let attempt = self.attempts.fetch_add(1, Ordering::Relaxed) + 1;
                let pending = self.spawn_establish(key.clone(), attempt, base_uri);
                record.pending = Some(pending.clone());
                record.attempt = attempt;
                Lookup::Pending { pending, discarded }
            })
            .await;

        match lookup {
            Lookup::Ready(connection) => Ok(connection),
            Lookup::Pending { pending, discarded } => {
                if let Some(connection) = discarded {
                    retire(connection);
                }
                pending.await
            }
        }
    }

    /// Run one establishment attempt on the runtime so it completes even if
    /// every caller is cancelled, and wrap it for shared awaiting.
    fn spawn_establish(&self, key: String, attempt: u64, base_uri: String) -> PendingConnection {
        let manager = self.clone();
        let task_key = key.clone();
        let handle = tokio::spawn(async move {
            let result = manager.establish(&task_key, &base_uri).await;
            manager.settle(&task_key, attempt, &result).await;
            result
        });

        let manager = self.clone();
        async move {
            match handle.await {
                Ok(result) => result,
                Err(join_error) => {
                    error!(tenant = %key, error = %join_error, "Connection task aborted");
                    let result = Err(DatabaseError::ConnectionFailed {
                        key: key.clone(),
                        message: "connection task aborted".to_string(),
                    });
                    manager.settle(&key, attempt, &result).await;
                    result
                }
            }
        }
        .boxed()
        .shared()
    }

    async fn establish(&self, key: &str, base_uri: &str) -> Result<Arc<Connection>, DatabaseError> {
        let database_name = tenant_database_name(&self.settings.tenant_prefix, key);
        let target = ConnectTarget {
            key: key.to_string(),
            uri: tenant_uri(base_uri, &database_name)?,
            database_name,
        };

        info!(tenant = %key, database = %target.database_name, "Opening tenant connection");
        let connection = Arc::new(
            open_with_timeout(self.connector.as_ref(), &target, self.settings.establish_timeout).await?,
        );

        self.registrar.register_all(&connection).await;
        if self.settings.auto_index {
            if let Err(e) = self.registrar.sync_indexes(&connection).await {
                warn!(tenant = %key, error = %e, "Index sync failed");
            }
        }
        Ok(connection)
    }

    /// Publish an attempt's result into the cache: the connection on success,
    /// an absent entry on failure. Results from superseded attempts are dropped.
    async fn settle(&self, key: &str, attempt: u64, result: &Result<Arc<Connection>, DatabaseError>) {
        let current = self
            .cache
            .modify(key, |record| {
                if record.attempt != attempt || record.pending.is_none() {
                    return false;
                }
                record.pending = None;
                record.connection = result.as_ref().ok().cloned();
                true
            })
            .await
            .unwrap_or(false);

        match (result, current) {
            (Ok(connection), true) => {
                info!(tenant = %key, database = %connection.database_name(), "Tenant connection ready");
            }
            (Ok(connection), false) => {
                // Torn down while the attempt was in flight
                debug!(tenant = %key, "Closing orphaned connection");
                connection.disconnect().await;
            }
            (Err(e), _) => {
                warn!(tenant = %key, error = %e, "Tenant connection failed");
            }
        }
    }

    /// Close and forget the connection for `identity`.
    pub async fn disconnect(&self, identity: &str) -> Result<bool, DatabaseError> {
        let key = cache_key(identity)?;
        match self.cache.delete(&key).await {
            Some(record) => {
                if let Some(connection) = record.connection {
                    connection.disconnect().await;
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Close and remove all connections (e.g., on shutdown).
    pub async fn close_all(&self) {
        for (key, record) in self.cache.drain().await {
            if let Some(connection) = record.connection {
                connection.disconnect().await;
            }
            info!(tenant = %key, "Removed tenant connection");
        }
    }

    /// Read-only report of every cache entry.
    pub async fn status(&self) -> Vec<ConnectionStatus> {
        let mut report = Vec::new();
        for (key, record) in self.cache.snapshot().await {
            report.push(status_of(key, &record).await);
        }
        report
    }

    pub async fn status_for(&self, identity: &str) -> Option<ConnectionStatus> {
        let key = cache_key(identity).ok()?;
        let record = self.cache.get(&key).await?;
        Some(status_of(key, &record).await)
    }
}

/// Shut down a discarded connection off the request path, the same way
/// teardown does.
pub(crate) fn retire(connection: Arc<Connection>) {
    tokio::spawn(async move { connection.disconnect().await });
}

pub(crate) async fn status_of(key: String, record: &ConnectionRecord) -> ConnectionStatus {
    match &record.connection {
        Some(connection) => ConnectionStatus {
            key,
            database: Some(connection.database_name().to_string()),
            state: Some(connection.ready_state()),
            pending: record.is_pending(),
            models: connection.bound_model_names().await,
        },
        None => ConnectionStatus {
            key,
            database: None,
            state: None,
            pending: record.is_pending(),
            models: Vec::new(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::TENANT_MODELS;
    use crate::testing::{test_config, FakeBehavior, FakeConnector};

    fn manager_with(connector: Arc<FakeConnector>) -> ConnectionManager {
        ConnectionManager::new(&test_config(), connector)
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_attempt() {
        let connector = Arc::new(FakeConnector::with_delay(Duration::from_millis(50)));
        let manager = manager_with(connector.clone());

        let calls = (0..16).map(|_| {
            let manager = manager.clone();
            tokio::spawn(async move { manager.connect_for_tenant("alice@example.com").await })
        });
        let connections: Vec<_> = futures::future::join_all(calls)
            .await
            .into_iter()
            .map(|joined| joined.unwrap().unwrap())
            .collect();

        assert_eq!(connector.attempts(), 1);
        assert!(connections.iter().all(|c| Arc::ptr_eq(c, &connections[0])));
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_failure() {
        let connector = Arc::new(FakeConnector::with_delay(Duration::from_millis(50)));
        connector.set_behavior(FakeBehavior::Fail("connection refused".into())).await;
        let manager = manager_with(connector.clone());

        let (a, b) = tokio::join!(
            manager.connect_for_tenant("alice@example.com"),
            manager.connect_for_tenant("alice@example.com"),
        );
        assert_eq!(connector.attempts(), 1);
        assert_eq!(a.unwrap_err().to_string(), b.unwrap_err().to_string());
    }

    #[tokio::test]
    async fn failure_resets_entry_and_next_call_retries() {
        let connector = Arc::new(FakeConnector::new());
        connector.set_behavior(FakeBehavior::Fail("boom".into())).await;
        let manager = manager_with(connector.clone());

        let err = manager.connect_for_tenant("alice@example.com").await.unwrap_err();
        assert!(err.is_retryable());
        assert!(manager.cache().get("alice@example.com").await.is_none());

        connector.set_behavior(FakeBehavior::Succeed).await;
        let connection = manager.connect_for_tenant("alice@example.com").await.unwrap();
        assert!(connection.is_ready());
        assert_eq!(connector.attempts(), 2);
    }

    #[tokio::test]
    async fn stalled_attempt_times_out_and_is_not_cached() {
        let connector = Arc::new(FakeConnector::new());
        connector.set_behavior(FakeBehavior::Stall).await;
        let mut config = test_config();
        config.database.establish_timeout_ms = 50;
        let manager = ConnectionManager::new(&config, connector.clone());

        let err = manager.connect_for_tenant("alice@example.com").await.unwrap_err();
        assert!(matches!(err, DatabaseError::ConnectionTimeout { after_ms: 50, .. }));
        assert!(manager.cache().get("alice@example.com").await.is_none());
    }

    #[tokio::test]
    async fn fast_path_reuses_connection() {
        let connector = Arc::new(FakeConnector::new());
        let manager = manager_with(connector.clone());

        let first = manager.connect_for_tenant("Alice@Example.com").await.unwrap();
        let second = manager.connect_for_tenant("alice@example.com ").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(connector.attempts(), 1);
        assert_eq!(connector.opened().await, vec![first.database_name().to_string()]);
    }

    #[tokio::test]
    async fn tenants_get_separate_connections() {
        let connector = Arc::new(FakeConnector::new());
        let manager = manager_with(connector.clone());

        let alice = manager.connect_for_tenant("alice@example.com").await.unwrap();
        let bob = manager.connect_for_tenant("bob@example.com").await.unwrap();
        assert_ne!(alice.id(), bob.id());
        assert_ne!(alice.database_name(), bob.database_name());
        assert_eq!(connector.attempts(), 2);
    }

    #[tokio::test]
    async fn dead_connection_is_reestablished() {
        let connector = Arc::new(FakeConnector::new());
        let manager = manager_with(connector.clone());

        let first = manager.connect_for_tenant("alice@example.com").await.unwrap();
        first.set_ready_state(ReadyState::Disconnected);

        let second = manager.connect_for_tenant("alice@example.com").await.unwrap();
        assert_ne!(first.id(), second.id());
        assert!(second.is_ready());
        assert_eq!(connector.attempts(), 2);
    }

    #[tokio::test]
    async fn reconnecting_connection_is_replaced_and_shut_down() {
        let connector = Arc::new(FakeConnector::new());
        let manager = manager_with(connector.clone());

        let first = manager.connect_for_tenant("alice@example.com").await.unwrap();
        first.set_ready_state(ReadyState::Connecting);

        let second = manager.connect_for_tenant("alice@example.com").await.unwrap();
        assert_ne!(first.id(), second.id());
        assert!(second.is_ready());
        assert_eq!(connector.attempts(), 2);

        // The discarded connection is closed in the background
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(first.ready_state(), ReadyState::Disconnected);
    }

    #[tokio::test]
    async fn missing_uri_fails_fast_outside_production() {
        let connector = Arc::new(FakeConnector::new());
        let mut config = test_config();
        config.database.uri = None;
        let manager = ConnectionManager::new(&config, connector.clone());

        let err = manager.connect_for_tenant("alice@example.com").await.unwrap_err();
        assert!(matches!(err, DatabaseError::ConfigurationMissing("MONGODB_URI")));
        assert!(err.to_string().contains("MONGODB_URI"));
        assert_eq!(connector.attempts(), 0);
    }

    #[tokio::test]
    async fn missing_uri_degrades_to_sentinel_in_production() {
        let connector = Arc::new(FakeConnector::new());
        let mut config = crate::config::AppConfig::production();
        config.database.uri = None;
        let manager = ConnectionManager::new(&config, connector.clone());

        let connection = manager.connect_for_tenant("alice@example.com").await.unwrap();
        assert_eq!(connection.ready_state(), ReadyState::Uninitialized);
        assert!(!connection.is_ready());
        assert!(manager.cache().is_empty().await);
        assert_eq!(connector.attempts(), 0);
    }

    #[tokio::test]
    async fn models_are_registered_before_handout() {
        let manager = manager_with(Arc::new(FakeConnector::new()));
        let connection = manager.connect_for_tenant("alice@example.com").await.unwrap();
        assert_eq!(connection.bound_model_names().await.len(), TENANT_MODELS.len());

        let status = manager.status_for("alice@example.com").await.unwrap();
        assert_eq!(status.state, Some(ReadyState::Connected));
        assert!(!status.pending);
        assert_eq!(status.models.len(), TENANT_MODELS.len());
    }

    #[tokio::test]
    async fn disconnect_removes_entry() {
        let connector = Arc::new(FakeConnector::new());
        let manager = manager_with(connector.clone());

        let connection = manager.connect_for_tenant("alice@example.com").await.unwrap();
        assert!(manager.disconnect("alice@example.com").await.unwrap());
        assert_eq!(connection.ready_state(), ReadyState::Disconnected);
        assert!(manager.status().await.is_empty());
        assert!(!manager.disconnect("alice@example.com").await.unwrap());

        manager.connect_for_tenant("alice@example.com").await.unwrap();
        assert_eq!(connector.attempts(), 2);
    }

    #[tokio::test]
    async fn teardown_during_attempt_orphans_its_result() {
        let connector = Arc::new(FakeConnector::with_delay(Duration::from_millis(50)));
        let manager = manager_with(connector.clone());

        let waiter = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.connect_for_tenant("alice@example.com").await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        manager.close_all().await;

        let connection = waiter.await.unwrap().unwrap();
        // The waiter still gets its result, but the cache stays empty
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(manager.cache().is_empty().await);
        assert_eq!(connection.ready_state(), ReadyState::Disconnected);
    }

    #[tokio::test]
    async fn status_reports_every_key() {
        let manager = manager_with(Arc::new(FakeConnector::new()));
        manager.connect_for_tenant("bob@example.com").await.unwrap();
        manager.connect_for_tenant("alice@example.com").await.unwrap();

        let keys: Vec<_> = manager.status().await.into_iter().map(|s| s.key).collect();
        assert_eq!(keys, vec!["alice@example.com", "bob@example.com"]);
    }
}
