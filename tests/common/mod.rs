#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::StatusCode;

use agro_api_rust::auth::Role;
use agro_api_rust::config::AppConfig;
use agro_api_rust::database::connection::tenant_database_name;
use agro_api_rust::database::Connector;
use agro_api_rust::testing::{test_config, token_for, unique_suffix, FakeConnector};
use agro_api_rust::{app, AppState};

/// A server bound to a free port inside the test's runtime, backed by a
/// fake connector so no database is needed.
pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    pub state: AppState,
    pub connector: Arc<FakeConnector>,
    pub client: reqwest::Client,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn token(&self, identity: &str, role: Role) -> String {
        token_for(&self.state.config, identity, role, 1)
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() > deadline {
                break;
            }
            if let Ok(resp) = self.client.get(self.url("/health")).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }
}

pub async fn spawn_server() -> Result<TestServer> {
    spawn_server_with(test_config(), FakeConnector::new()).await
}

pub async fn spawn_server_with(config: AppConfig, connector: FakeConnector) -> Result<TestServer> {
    let connector = Arc::new(connector);
    let state = AppState::new(Arc::new(config), connector.clone() as Arc<dyn Connector>);
    let (port, base_url) = listen(state.clone()).await?;

    let server = TestServer {
        port,
        base_url,
        state,
        connector,
        client: reqwest::Client::new(),
    };
    server.wait_ready(Duration::from_secs(5)).await?;
    Ok(server)
}

async fn listen(state: AppState) -> Result<(u16, String)> {
    // Pick an unused port for isolation
    let port = portpicker::pick_unused_port().context("failed to pick free port")?;
    let base_url = format!("http://127.0.0.1:{}", port);

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
        .await
        .context("failed to bind test port")?;

    let router = app(state);
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    Ok((port, base_url))
}

/// A server on the real driver, isolated under per-run database names.
pub struct MongoServer {
    pub base_url: String,
    pub state: AppState,
    pub client: reqwest::Client,
    uri: String,
}

impl MongoServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Email unique to this run, so tenant databases never collide.
    pub fn email(&self, local: &str) -> String {
        format!("{}@{}.example.com", local, self.state.config.database.tenant_prefix.trim_end_matches('_'))
    }

    /// Drop the directory database and the tenant databases of `identities`.
    pub async fn cleanup(self, identities: &[String]) -> Result<()> {
        self.state.shutdown().await;

        let client = mongodb::Client::with_uri_str(&self.uri).await?;
        let database = &self.state.config.database;
        client.database(&database.global_database).drop(None).await?;
        for identity in identities {
            let name = tenant_database_name(&database.tenant_prefix, identity);
            client.database(&name).drop(None).await?;
        }
        Ok(())
    }
}

/// `None` unless `MONGODB_URI` points at a reachable server.
pub async fn spawn_mongo_server() -> Result<Option<MongoServer>> {
    let Ok(uri) = std::env::var("MONGODB_URI") else {
        eprintln!("MONGODB_URI not set, skipping");
        return Ok(None);
    };

    let run = unique_suffix();
    let mut config = test_config();
    config.database.uri = Some(uri.clone());
    config.database.global_database = format!("agro_test_{}_global", run);
    config.database.tenant_prefix = format!("t{}_", run);
    // Off, so the account directory must index itself
    config.database.auto_index = false;
    config.security.password_cost = 4;

    let state = AppState::from_config(Arc::new(config));
    let (_, base_url) = listen(state.clone()).await?;
    let server = MongoServer {
        base_url,
        state,
        client: reqwest::Client::new(),
        uri,
    };

    // Health reports the directory database as "ok" once it is reachable
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if let Ok(resp) = server.client.get(server.url("/health")).send().await {
            let body = resp.json::<serde_json::Value>().await.unwrap_or_default();
            if body["data"]["global"] == "ok" {
                return Ok(Some(server));
            }
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    anyhow::bail!("MongoDB at MONGODB_URI did not become reachable")
}
