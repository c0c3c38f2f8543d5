use futures::future::{BoxFuture, Shared};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::connection::Connection;
use super::error::DatabaseError;

/// Establishment in flight, awaitable by any number of callers.
pub type PendingConnection = Shared<BoxFuture<'static, Result<Arc<Connection>, DatabaseError>>>;

/// Cache slot for one key: a resolved connection, an in-flight attempt, or both
/// absent. A record with both fields absent is never stored.
#[derive(Clone, Default)]
pub struct ConnectionRecord {
    pub connection: Option<Arc<Connection>>,
    pub pending: Option<PendingConnection>,
    /// Identifies the attempt that owns `pending`, so a late result from a
    /// torn-down attempt cannot overwrite a newer one.
    pub(crate) attempt: u64,
}

impl ConnectionRecord {
    pub fn established(connection: Arc<Connection>) -> Self {
        Self {
            connection: Some(connection),
            pending: None,
            attempt: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.connection.is_none() && self.pending.is_none()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

impl std::fmt::Debug for ConnectionRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRecord")
            .field("connection", &self.connection.as_ref().map(|c| c.id()))
            .field("pending", &self.pending.is_some())
            .field("attempt", &self.attempt)
            .finish()
    }
}

/// Map from cache key to connection record.
///
/// Owned by the composition root and shared through `Arc`. The lock is only
/// ever held for map reads and writes, never across I/O.
#[derive(Debug, Default)]
pub struct ConnectionCache {
    entries: Mutex<HashMap<String, ConnectionRecord>>,
}

impl ConnectionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &str) -> Option<ConnectionRecord> {
        self.entries.lock().await.get(key).cloned()
    }

    /// Replace the entry for `key`. Storing an empty record removes the entry.
    pub async fn put(&self, key: &str, record: ConnectionRecord) {
        let mut entries = self.entries.lock().await;
        if record.is_empty() {
            entries.remove(key);
        } else {
            entries.insert(key.to_string(), record);
        }
    }

    pub async fn delete(&self, key: &str) -> Option<ConnectionRecord> {
        self.entries.lock().await.remove(key)
    }

    /// Run `f` against the record for `key` while holding the cache lock,
    /// creating an empty record first if none exists. The check-and-install
    /// step of connection establishment goes through here.
    pub async fn update<R>(&self, key: &str, f: impl FnOnce(&mut ConnectionRecord) -> R) -> R {
        let mut entries = self.entries.lock().await;
        let record = entries.entry(key.to_string()).or_default();
        let result = f(record);
        if record.is_empty() {
            entries.remove(key);
        }
        result
    }

    /// Like [`update`](Self::update) but only touches an existing record.
    pub async fn modify<R>(
        &self,
        key: &str,
        f: impl FnOnce(&mut ConnectionRecord) -> R,
    ) -> Option<R> {
        let mut entries = self.entries.lock().await;
        let record = entries.get_mut(key)?;
        let result = f(record);
        if record.is_empty() {
            entries.remove(key);
        }
        Some(result)
    }

    pub async fn snapshot(&self) -> Vec<(String, ConnectionRecord)> {
        let entries = self.entries.lock().await;
        let mut snapshot: Vec<_> = entries
            .iter()
            .map(|(key, record)| (key.clone(), record.clone()))
            .collect();
        snapshot.sort_by(|a, b| a.0.cmp(&b.0));
        snapshot
    }

    /// Remove and return every record (used on shutdown).
    pub async fn drain(&self) -> Vec<(String, ConnectionRecord)> {
        self.entries.lock().await.drain().collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}
