//! In-process doubles for exercising the connection layer without a database.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::auth::{issue_token, Claims, Role};
use crate::config::AppConfig;
use crate::database::{ConnectTarget, Connection, Connector, DatabaseError};

pub const TEST_JWT_SECRET: &str = "test-secret";

/// Development config pointed at a placeholder address.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::development();
    config.database.uri = Some("mongodb://localhost:27017/agro".to_string());
    config.database.auto_index = false;
    config.security.jwt_secret = TEST_JWT_SECRET.to_string();
    config.api.enable_request_logging = false;
    config
}

/// Sign a token against `config` valid for `hours`.
pub fn token_for(config: &AppConfig, identity: &str, role: Role, hours: i64) -> String {
    let ttl = match chrono::Duration::try_hours(hours) {
        Some(ttl) => ttl,
        None => panic!("test token lifetime out of range: {} hours", hours),
    };
    match Claims::new(identity, role, ttl).and_then(|claims| issue_token(&config.security.jwt_secret, &claims)) {
        Ok(token) => token,
        Err(e) => panic!("test token could not be signed: {}", e),
    }
}

/// Short random suffix for per-run database and tenant names.
pub fn unique_suffix() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(12);
    id
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeBehavior {
    Succeed,
    Fail(String),
    /// Never resolves; exercises the establish timeout.
    Stall,
}

/// Connector that hands out detached connections and counts every attempt.
pub struct FakeConnector {
    delay: Duration,
    behavior: Mutex<FakeBehavior>,
    attempts: AtomicUsize,
    opened: Mutex<Vec<String>>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::with_delay(Duration::ZERO)
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            behavior: Mutex::new(FakeBehavior::Succeed),
            attempts: AtomicUsize::new(0),
            opened: Mutex::new(Vec::new()),
        }
    }

    pub async fn set_behavior(&self, behavior: FakeBehavior) {
        *self.behavior.lock().await = behavior;
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Database names of every successful open, in order.
    pub async fn opened(&self) -> Vec<String> {
        self.opened.lock().await.clone()
    }
}

impl Default for FakeConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn open(&self, target: &ConnectTarget) -> Result<Connection, DatabaseError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let behavior = self.behavior.lock().await.clone();

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match behavior {
            FakeBehavior::Succeed => {
                self.opened.lock().await.push(target.database_name.clone());
                Ok(Connection::detached(&target.key, &target.database_name))
            }
            FakeBehavior::Fail(message) => Err(DatabaseError::ConnectionFailed {
                key: target.key.clone(),
                message,
            }),
            FakeBehavior::Stall => std::future::pending().await,
        }
    }
}
