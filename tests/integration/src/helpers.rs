//! Test helpers for integration tests
//!
//! Provides utilities for spawning test servers and making HTTP requests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use crate::fixtures::Account;
use loyalty_api::{create_app, create_app_state, run_server, AppState};
use loyalty_common::{
    AccountConfig, AppConfig, AppSettings, CorsConfig, DatabaseConfig, Environment, JwtConfig,
    JwtService, RateLimitConfig, ServerConfig,
};
use loyalty_core::{Caller, Role};
use loyalty_db::MemoryStore;
use loyalty_service::ServiceContextBuilder;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub const TEST_JWT_SECRET: &str = "integration-test-secret";

/// Test server instance that manages lifecycle
pub struct TestServer {
    pub addr: SocketAddr,
    pub client: Client,
    /// Present when the server runs over the in-memory store
    pub store: Option<MemoryStore>,
    jwt: JwtService,
    _handle: JoinHandle<()>,
}

impl TestServer {
    /// Start a server over a fresh in-memory store
    pub async fn start() -> Result<Self> {
        let config = test_config();
        let store = MemoryStore::new();
        let service_context = ServiceContextBuilder::new()
            .memory(&store)
            .jwt_service(Arc::new(JwtService::new(
                &config.jwt.secret,
                config.jwt.token_expiry,
            )))
            .accounts(config.accounts.clone())
            .build()?;

        let state = AppState::new(service_context, config);
        Self::spawn(state, Some(store)).await
    }

    /// Start a server over PostgreSQL, configured from the environment
    pub async fn start_postgres() -> Result<Self> {
        dotenvy::dotenv().ok();
        let config = AppConfig::from_env()?;
        let state = create_app_state(config).await?;
        Self::spawn(state, None).await
    }

    async fn spawn(state: AppState, store: Option<MemoryStore>) -> Result<Self> {
        let jwt = JwtService::new(
            &state.config().jwt.secret,
            state.config().jwt.token_expiry,
        );
        let app = create_app(state)?;

        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
        let addr = listener.local_addr()?;

        let handle = tokio::spawn(async move {
            run_server(app, listener).await.ok();
        });

        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;

        Ok(Self {
            addr,
            client,
            store,
            jwt,
            _handle: handle,
        })
    }

    /// Get base URL for the server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Absolute URL for a path on this server
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }

    fn store(&self) -> Result<&MemoryStore> {
        self.store
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("server is not backed by the in-memory store"))
    }

    /// Seed a verified account and return a bearer token for it
    pub fn seed(&self, utorid: &str, role: Role) -> Result<Account> {
        let user = self.store()?.seed_user(utorid, utorid, role)?;
        let caller = Caller::new(user.id, user.utorid, user.role);
        let token = self.jwt.issue(&caller)?;
        Ok(Account {
            id: i64::from(caller.id),
            token,
        })
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> Result<Response> {
        Ok(self.client.get(self.url(path)).send().await?)
    }

    /// Make a GET request with auth token
    pub async fn get_auth(&self, path: &str, token: &str) -> Result<Response> {
        send(self.client.get(self.url(path)), token).await
    }

    /// Make a POST request with JSON body
    pub async fn post<T: Serialize>(&self, path: &str, body: &T) -> Result<Response> {
        Ok(self.client.post(self.url(path)).json(body).send().await?)
    }

    /// Make a POST request with auth token
    pub async fn post_auth<T: Serialize>(
        &self,
        path: &str,
        token: &str,
        body: &T,
    ) -> Result<Response> {
        send(self.client.post(self.url(path)).json(body), token).await
    }

    /// Make a PATCH request with auth token
    pub async fn patch_auth<T: Serialize>(
        &self,
        path: &str,
        token: &str,
        body: &T,
    ) -> Result<Response> {
        send(self.client.patch(self.url(path)).json(body), token).await
    }

    /// Make a DELETE request with auth token
    pub async fn delete_auth(&self, path: &str, token: &str) -> Result<Response> {
        send(self.client.delete(self.url(path)), token).await
    }
}

async fn send(request: RequestBuilder, token: &str) -> Result<Response> {
    Ok(request
        .header("Authorization", format!("Bearer {token}"))
        .send()
        .await?)
}

/// Configuration for servers over the in-memory store
pub fn test_config() -> AppConfig {
    AppConfig {
        app: AppSettings {
            name: "loyalty-test".to_string(),
            env: Environment::Development,
        },
        api: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            trust_forwarded_for: false,
        },
        database: DatabaseConfig {
            url: String::new(),
            max_connections: 1,
            min_connections: 1,
        },
        jwt: JwtConfig {
            secret: TEST_JWT_SECRET.to_string(),
            token_expiry: 3600,
        },
        rate_limit: RateLimitConfig {
            requests_per_second: 1,
            burst: 1000,
        },
        cors: CorsConfig {
            allowed_origins: Vec::new(),
        },
        accounts: AccountConfig::default(),
    }
}

/// PostgreSQL-backed tests only run when `DATABASE_URL` is set
pub fn check_postgres_env() -> bool {
    dotenvy::dotenv().ok();
    if std::env::var("DATABASE_URL").is_err() {
        eprintln!("Skipping test: DATABASE_URL not set");
        return false;
    }
    true
}

/// Assert response status and parse JSON body
pub async fn assert_json<T: DeserializeOwned>(
    response: Response,
    expected_status: StatusCode,
) -> Result<T> {
    let status = response.status();
    if status != expected_status {
        let body = response.text().await?;
        anyhow::bail!("Expected status {expected_status}, got {status}. Body: {body}");
    }
    Ok(response.json().await?)
}

/// Assert response status without parsing body
pub async fn assert_status(response: Response, expected_status: StatusCode) -> Result<()> {
    let status = response.status();
    if status != expected_status {
        let body = response.text().await?;
        anyhow::bail!("Expected status {expected_status}, got {status}. Body: {body}");
    }
    Ok(())
}

/// Assert an error response and return its machine code
pub async fn assert_error(response: Response, expected_status: StatusCode) -> Result<String> {
    let body: serde_json::Value = assert_json(response, expected_status).await?;
    body["error"]["code"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("missing error code in {body}"))
}
