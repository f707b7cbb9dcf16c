use std::net::SocketAddr;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHasher, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use axum::http::header::SET_COOKIE;
use axum::http::HeaderMap;
use sea_orm::DatabaseConnection;
use sea_orm_migration::MigratorTrait;
use tokio::net::TcpListener;

use crate::config::{Config, SecurityConfig};
use crate::controllers::AppState;
use crate::migrations::Migrator;
use crate::models::user;
use crate::store::{NewUser, SeaStore, UserStore};

/// A test application builder for integration testing.
///
/// Spins up a Warden server with an in-memory SQLite database on an
/// ephemeral port.
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_login() {
///     let app = TestApp::new().await;
///     app.seed_user("alice", "wonderland").await;
///     let res = app.client.post(&app.url("/api/jwt-auth/login"), r#"{"username":"alice","password":"wonderland"}"#).await;
///     assert_eq!(res.status, 200);
/// }
/// ```
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: TestClient,
    pub db: DatabaseConnection,
    pub config: Config,
    pub state: AppState,
}

impl TestApp {
    /// Default test configuration: in-memory database, default lifetimes.
    pub fn config() -> Config {
        Config {
            database_url: "sqlite::memory:".to_string(),
            jwt_secret: "test-secret-key-for-testing".to_string(),
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            environment: "test".to_string(),
            allowed_origins: vec!["http://localhost:3000".to_string()],
            trusted_proxies: vec![std::net::IpAddr::from([127, 0, 0, 1])],
            store_timeout_secs: 10,
            sweep_interval_secs: 300,
            security: SecurityConfig::default(),
        }
    }

    pub async fn new() -> Self {
        Self::with_config(Self::config()).await
    }

    /// Create a new test app with a custom config.
    pub async fn with_config(config: Config) -> Self {
        let db = crate::db::connect(&config)
            .await
            .expect("Failed to connect test database");
        Migrator::up(&db, None)
            .await
            .expect("Failed to run migrations");

        let app = crate::App::from_parts(db, config);
        let router = app.router();
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test server");
        let addr = listener.local_addr().expect("Failed to get local addr");

        tokio::spawn(async move {
            axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .unwrap();
        });

        TestApp {
            addr,
            client: TestClient::new(addr),
            state: app.state().clone(),
            db: app.db,
            config: app.config,
        }
    }

    /// Get the base URL for the test server.
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn store(&self) -> SeaStore {
        SeaStore::new(self.db.clone(), self.config.store_timeout())
    }

    /// Insert a user with a cheaply hashed password.
    pub async fn seed_user(&self, username: &str, password: &str) -> user::Model {
        self.store()
            .insert_user(NewUser {
                username: username.to_string(),
                email: format!("{}@example.com", username),
                password_hash: fast_hash(password),
                role: "user".to_string(),
            })
            .await
            .expect("Failed to seed user")
    }

    /// Login body for `username`/`password`.
    pub fn credentials(username: &str, password: &str) -> String {
        serde_json::json!({ "username": username, "password": password }).to_string()
    }
}

/// Argon2id with minimal cost parameters. Verification reads the parameters
/// from the hash, so these verify like any other.
pub fn fast_hash(password: &str) -> String {
    let params = Params::new(8, 1, 1, None).expect("valid argon2 params");
    let salt = SaltString::generate(&mut OsRng);
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
        .hash_password(password.as_bytes(), &salt)
        .expect("Failed to hash password")
        .to_string()
}

/// A simple HTTP test client with helper methods.
///
/// Cookies are never stored automatically: credential cookies are `Secure`
/// and the test server speaks plain HTTP, so tests pass them explicitly.
#[derive(Clone)]
pub struct TestClient {
    inner: reqwest::Client,
    base_addr: SocketAddr,
}

impl TestClient {
    pub fn new(addr: SocketAddr) -> Self {
        TestClient {
            inner: reqwest::Client::new(),
            base_addr: addr,
        }
    }

    /// Start a request with full control over headers.
    pub fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.inner.request(method, url)
    }

    pub async fn send(&self, request: reqwest::RequestBuilder) -> TestResponse {
        let res = request.send().await.expect("request failed");
        TestResponse::from_response(res).await
    }

    /// Send a GET request.
    pub async fn get(&self, url: &str) -> TestResponse {
        self.send(self.inner.get(url)).await
    }

    /// Send a GET request with a bearer token.
    pub async fn get_with_auth(&self, url: &str, token: &str) -> TestResponse {
        self.send(
            self.inner
                .get(url)
                .header("Authorization", format!("Bearer {}", token)),
        )
        .await
    }

    /// Send a GET request with Basic credentials.
    pub async fn get_with_basic(&self, url: &str, username: &str, password: &str) -> TestResponse {
        self.send(self.inner.get(url).basic_auth(username, Some(password)))
            .await
    }

    /// Send a GET request carrying one cookie.
    pub async fn get_with_cookie(&self, url: &str, name: &str, value: &str) -> TestResponse {
        self.send(self.inner.get(url).header("Cookie", format!("{}={}", name, value)))
            .await
    }

    /// Send a POST request with a JSON body.
    pub async fn post(&self, url: &str, body: &str) -> TestResponse {
        self.send(
            self.inner
                .post(url)
                .header("Content-Type", "application/json")
                .body(body.to_string()),
        )
        .await
    }

    /// Send a POST request with a bearer token and no body.
    pub async fn post_with_auth(&self, url: &str, token: &str) -> TestResponse {
        self.send(
            self.inner
                .post(url)
                .header("Authorization", format!("Bearer {}", token)),
        )
        .await
    }

    /// Send a POST request carrying one cookie and no body.
    pub async fn post_with_cookie(&self, url: &str, name: &str, value: &str) -> TestResponse {
        self.send(self.inner.post(url).header("Cookie", format!("{}={}", name, value)))
            .await
    }

    /// Get the base URL.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.base_addr)
    }
}

/// A simplified HTTP response for test assertions.
#[derive(Debug)]
pub struct TestResponse {
    pub status: u16,
    pub body: String,
    pub headers: HeaderMap,
}

impl TestResponse {
    async fn from_response(res: reqwest::Response) -> Self {
        let status = res.status().as_u16();
        let headers = res.headers().clone();
        let body = res.text().await.unwrap_or_default();
        TestResponse {
            status,
            body,
            headers,
        }
    }

    /// Parse the body as JSON.
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).expect("Failed to parse response as JSON")
    }

    /// Get the error field from the response.
    pub fn error(&self) -> serde_json::Value {
        self.json()["error"].clone()
    }

    pub fn header(&self, name: &str) -> Option<String> {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    /// Raw `Set-Cookie` line for `name`.
    pub fn set_cookie(&self, name: &str) -> Option<String> {
        let prefix = format!("{}=", name);
        self.headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|line| line.starts_with(&prefix))
            .map(str::to_string)
    }

    /// Value of the `name` cookie set by this response.
    pub fn cookie(&self, name: &str) -> Option<String> {
        let line = self.set_cookie(name)?;
        let pair = line.split(';').next()?;
        pair.split_once('=').map(|(_, value)| value.to_string())
    }
}
