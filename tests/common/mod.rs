#![allow(dead_code)]

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::task::JoinHandle;

use gatehouse::accounts::Accounts;
use gatehouse::clock::ManualClock;
use gatehouse::config::AuthConfig;
use gatehouse::server::{AppState, create_router};
use gatehouse::store::{SqliteStore, Store};

pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_PASSWORD: &str = "password1234";

/// A gatehouse server running in-process on an ephemeral port, with a
/// clock the test controls.
pub struct TestServer {
    pub temp_dir: TempDir,
    pub base_url: String,
    pub clock: Arc<ManualClock>,
    pub state: Arc<AppState>,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with(AuthConfig::default()).await
    }

    pub async fn start_with(config: AuthConfig) -> Self {
        let temp_dir = TempDir::new().expect("create temp dir");
        let store = Arc::new(
            SqliteStore::new(temp_dir.path().join("gatehouse.db")).expect("open store"),
        );
        store.initialize().expect("initialize store");
        Accounts::new(store.clone())
            .bootstrap_root(ADMIN_USERNAME, ADMIN_PASSWORD)
            .expect("bootstrap root admin");

        let clock = Arc::new(ManualClock::new(Utc::now()));
        let state = Arc::new(AppState::with_clock(store, config, clock.clone()));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let app = create_router(state.clone());
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve");
        });

        Self {
            temp_dir,
            base_url: format!("http://{addr}"),
            clock,
            state,
            handle,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// A client that does not follow redirects, so tests can inspect them.
    pub fn client(&self) -> reqwest::Client {
        reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("build client")
    }

    pub async fn create_user(&self, username: &str, password: &str, is_admin: bool) -> i64 {
        let resp = self
            .client()
            .post(self.url("/api/v1/admin/users"))
            .basic_auth(ADMIN_USERNAME, Some(ADMIN_PASSWORD))
            .json(&json!({ "username": username, "password": password, "is_admin": is_admin }))
            .send()
            .await
            .expect("create user");
        assert_eq!(resp.status(), 201, "create user {username}");
        let body: Value = resp.json().await.expect("parse user");
        body["data"]["id"].as_i64().expect("user id")
    }

    pub async fn create_resource(&self, name: &str) -> String {
        let resp = self
            .client()
            .post(self.url("/api/v1/resources"))
            .basic_auth(ADMIN_USERNAME, Some(ADMIN_PASSWORD))
            .json(&json!({ "name": name }))
            .send()
            .await
            .expect("create resource");
        assert_eq!(resp.status(), 201, "create resource {name}");
        let body: Value = resp.json().await.expect("parse resource");
        body["data"]["id"].as_str().expect("resource id").to_string()
    }

    /// Loads the login page and returns its CSRF cookie pair and the token
    /// embedded in the form.
    pub async fn login_form_token(&self) -> (String, String) {
        let resp = self
            .client()
            .get(self.url("/login"))
            .header(reqwest::header::ACCEPT, "text/html")
            .send()
            .await
            .expect("login page");
        assert_eq!(resp.status(), 200);
        let cookie = session_cookie(resp.headers()).expect("csrf cookie");
        let html = resp.text().await.expect("login html");
        (cookie, form_token(&html).expect("csrf field"))
    }

    /// Logs in and returns the session cookie pair, ready for a `Cookie` header.
    pub async fn login(&self, username: &str, password: &str) -> String {
        let resp = self
            .client()
            .post(self.url("/login"))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await
            .expect("login");
        assert_eq!(resp.status(), 200, "login {username}");
        session_cookie(resp.headers()).expect("session cookie")
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Pulls `name=value` out of the first `Set-Cookie` header.
pub fn session_cookie(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(reqwest::header::SET_COOKIE)?.to_str().ok()?;
    raw.split(';').next().map(str::to_string)
}

/// Pulls the hidden `csrf_token` value out of the login form.
pub fn form_token(html: &str) -> Option<String> {
    let marker = r#"name="csrf_token" value=""#;
    let start = html.find(marker)? + marker.len();
    let end = html[start..].find('"')?;
    Some(html[start..start + end].to_string())
}

pub fn basic(username: &str, password: &str) -> HeaderValue {
    let encoded = STANDARD.encode(format!("{username}:{password}"));
    HeaderValue::from_str(&format!("Basic {encoded}")).expect("header value")
}
