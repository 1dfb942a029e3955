#![allow(dead_code)]

//! Shared test harness: a stub of the external REST backend plus helpers
//! for standing up the gateway against it.

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use forkd_gateway::rate_limit::RateLimitConfig;
use forkd_gateway::{ServerConfig, start_server};
use serde_json::{Value, json};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use url::Url;

pub const TEST_EMAIL: &str = "k123456@nu.edu.pk";
pub const TEST_PASSWORD: &str = "secret123";

/// In-memory stand-in for the external REST backend.
///
/// Tokens are plain counters ("A1", "R1", ...). Tests drive expiry by
/// invalidating the access set, and failure modes through the flags.
pub struct StubBackend {
    pub login_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub revoke_calls: AtomicUsize,
    pub profile_calls: AtomicUsize,
    /// Reject every refresh attempt (simulates an expired/blacklisted
    /// refresh token).
    pub fail_refresh: AtomicBool,
    /// Reject every bearer-authorized request regardless of token
    /// (drives the retry-returns-401 path).
    pub reject_protected: AtomicBool,
    /// Delay before the refresh endpoint answers, in milliseconds.
    pub refresh_delay_ms: AtomicU64,
    minted: AtomicUsize,
    valid_access: Mutex<HashSet<String>>,
    valid_refresh: Mutex<HashSet<String>>,
}

impl StubBackend {
    fn new() -> Self {
        Self {
            login_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            revoke_calls: AtomicUsize::new(0),
            profile_calls: AtomicUsize::new(0),
            fail_refresh: AtomicBool::new(false),
            reject_protected: AtomicBool::new(false),
            refresh_delay_ms: AtomicU64::new(0),
            minted: AtomicUsize::new(0),
            valid_access: Mutex::new(HashSet::new()),
            valid_refresh: Mutex::new(HashSet::new()),
        }
    }

    fn mint(&self) -> usize {
        self.minted.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Invalidate every outstanding access token, simulating expiry.
    pub fn expire_access_tokens(&self) {
        self.valid_access.lock().unwrap().clear();
    }

    fn access_ok(&self, headers: &HeaderMap) -> bool {
        if self.reject_protected.load(Ordering::SeqCst) {
            return false;
        }
        let Some(value) = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) else {
            return false;
        };
        let Some(token) = value.strip_prefix("Bearer ") else {
            return false;
        };
        self.valid_access.lock().unwrap().contains(token)
    }
}

fn invalid_token_response() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({
            "detail": "Given token not valid for any token type",
            "code": "token_not_valid"
        })),
    )
        .into_response()
}

async fn stub_login(State(stub): State<Arc<StubBackend>>, Json(body): Json<Value>) -> Response {
    stub.login_calls.fetch_add(1, Ordering::SeqCst);

    if body["nu_email"] != TEST_EMAIL || body["password"] != TEST_PASSWORD {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": "No active account found with the given credentials" })),
        )
            .into_response();
    }

    let n = stub.mint();
    let access = format!("A{}", n);
    let refresh = format!("R{}", n);
    stub.valid_access.lock().unwrap().insert(access.clone());
    stub.valid_refresh.lock().unwrap().insert(refresh.clone());

    Json(json!({
        "access": access,
        "refresh": refresh,
        "user": { "nu_email": TEST_EMAIL, "full_name": "Kaavish Student" }
    }))
    .into_response()
}

async fn stub_refresh(State(stub): State<Arc<StubBackend>>, Json(body): Json<Value>) -> Response {
    stub.refresh_calls.fetch_add(1, Ordering::SeqCst);

    let delay = stub.refresh_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    let refresh = body["refresh"].as_str().unwrap_or_default();
    let known = stub.valid_refresh.lock().unwrap().contains(refresh);
    if stub.fail_refresh.load(Ordering::SeqCst) || !known {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "detail": "Token is invalid or expired",
                "code": "token_not_valid"
            })),
        )
            .into_response();
    }

    let access = format!("A{}", stub.mint());
    stub.valid_access.lock().unwrap().insert(access.clone());
    Json(json!({ "access": access })).into_response()
}

async fn stub_logout(State(stub): State<Arc<StubBackend>>, Json(body): Json<Value>) -> Response {
    stub.revoke_calls.fetch_add(1, Ordering::SeqCst);

    if let Some(refresh) = body["refresh"].as_str() {
        stub.valid_refresh.lock().unwrap().remove(refresh);
    }
    Json(json!({})).into_response()
}

async fn stub_update_profile(
    State(stub): State<Arc<StubBackend>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    stub.profile_calls.fetch_add(1, Ordering::SeqCst);

    if !stub.access_ok(&headers) {
        return invalid_token_response();
    }

    Json(json!({
        "nu_email": TEST_EMAIL,
        "full_name": body["full_name"],
        "bio": body["bio"],
        "skills": body["skills"]
    }))
    .into_response()
}

async fn stub_register(Json(body): Json<Value>) -> Response {
    (
        StatusCode::CREATED,
        Json(json!({
            "nu_email": body["nu_email"],
            "detail": "Verification email sent"
        })),
    )
        .into_response()
}

async fn stub_projects_list(State(stub): State<Arc<StubBackend>>, headers: HeaderMap) -> Response {
    if !stub.access_ok(&headers) {
        return invalid_token_response();
    }
    Json(json!([
        { "id": 1, "title": "FORK'D NUCES", "tags": ["rust", "web"] }
    ]))
    .into_response()
}

async fn stub_projects_create(
    State(stub): State<Arc<StubBackend>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !stub.access_ok(&headers) {
        return invalid_token_response();
    }
    (
        StatusCode::CREATED,
        Json(json!({ "id": 2, "title": body["title"] })),
    )
        .into_response()
}

async fn stub_users_list(State(stub): State<Arc<StubBackend>>, headers: HeaderMap) -> Response {
    if !stub.access_ok(&headers) {
        return invalid_token_response();
    }
    Json(json!([{ "nu_email": TEST_EMAIL, "full_name": "Kaavish Student" }])).into_response()
}

fn stub_router(stub: Arc<StubBackend>) -> Router {
    Router::new()
        .route("/api/auth/login/", post(stub_login))
        .route("/api/token/refresh/", post(stub_refresh))
        .route("/api/auth/logout/", post(stub_logout))
        .route("/api/auth/me/update/", put(stub_update_profile))
        .route("/api/auth/register/", post(stub_register))
        .route("/api/projects/", get(stub_projects_list).post(stub_projects_create))
        .route("/api/users/", get(stub_users_list))
        .with_state(stub)
}

/// Spawn the stub backend on a random port.
pub async fn spawn_stub() -> (Arc<StubBackend>, Url, tokio::task::JoinHandle<()>) {
    let stub = Arc::new(StubBackend::new());
    let app = stub_router(stub.clone());

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind stub backend");
    let addr = listener.local_addr().expect("Failed to get local address");

    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    let url = Url::parse(&format!("http://{}/", addr)).expect("Invalid stub URL");
    (stub, url, handle)
}

/// Gateway + stub backend, both on random ports.
pub struct TestContext {
    pub stub: Arc<StubBackend>,
    pub gateway_url: Url,
    gateway_handle: tokio::task::JoinHandle<()>,
    stub_handle: tokio::task::JoinHandle<()>,
}

impl Drop for TestContext {
    fn drop(&mut self) {
        self.gateway_handle.abort();
        self.stub_handle.abort();
    }
}

/// Start the full stack: stub backend and gateway wired together.
pub async fn setup() -> TestContext {
    let (stub, backend_url, stub_handle) = spawn_stub().await;

    let config = ServerConfig {
        backend_url,
        secure_cookies: false,
        rate_limits: RateLimitConfig::lenient(),
    };
    let (gateway_handle, addr) = start_server(config, 0).await;

    let gateway_url = Url::parse(&format!("http://{}/", addr)).expect("Invalid gateway URL");

    TestContext {
        stub,
        gateway_url,
        gateway_handle,
        stub_handle,
    }
}

/// Build an in-process gateway app pointed at the given backend, for
/// tower-oneshot tests.
pub fn gateway_app(backend_url: Url) -> axum::Router {
    let config = ServerConfig {
        backend_url,
        secure_cookies: false,
        rate_limits: RateLimitConfig::lenient(),
    };
    forkd_gateway::create_app(&config)
}

/// Backend URL that nothing listens on, for tests that must not (or
/// cannot) reach a backend.
pub fn unreachable_backend() -> Url {
    Url::parse("http://127.0.0.1:9/").expect("Invalid URL")
}

/// Collect Set-Cookie header values from a response.
pub fn extract_set_cookies(response: &axum::http::Response<axum::body::Body>) -> Vec<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .collect()
}

/// Check if cookies contain a token being cleared (Max-Age=0).
pub fn has_cleared_cookie(cookies: &[String], cookie_name: &str) -> bool {
    cookies
        .iter()
        .any(|c| c.starts_with(&format!("{}=", cookie_name)) && c.contains("Max-Age=0"))
}

/// Find the Set-Cookie value for a cookie, if any.
pub fn find_cookie<'a>(cookies: &'a [String], cookie_name: &str) -> Option<&'a String> {
    cookies
        .iter()
        .find(|c| c.starts_with(&format!("{}=", cookie_name)))
}

/// Decode a response body as JSON.
pub async fn body_json(response: axum::http::Response<axum::body::Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&bytes).expect("Body is not JSON")
}
