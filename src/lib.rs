pub mod api;
pub mod backend;
pub mod cli;
pub mod client;
pub mod cookies;
pub mod guard;
pub mod rate_limit;

use api::create_api_router;
use axum::{Router, middleware, response::Html, routing::get};
use backend::BackendClient;
use guard::route_guard;
use rate_limit::RateLimitConfig;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use url::Url;

pub struct ServerConfig {
    /// Base URL of the external REST backend (owns users, projects,
    /// issues, comments, and all token issuance)
    pub backend_url: Url,
    /// Whether to set the Secure flag on session cookies (should be true
    /// in production with HTTPS)
    pub secure_cookies: bool,
    /// Per-IP rate limiting for credential endpoints
    pub rate_limits: RateLimitConfig,
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    let backend = BackendClient::new(config.backend_url.clone());

    let api_router = create_api_router(
        backend,
        config.secure_cookies,
        config.rate_limits.clone(),
    );

    // Navigable page routes. The frontend bundle is built and served
    // separately in deployment; these handlers return the shell the
    // bundle mounts into, which is all the guard needs to stand in front
    // of. API paths classify as open, so the guard layer passes them
    // through untouched.
    let page_routes = Router::new()
        .route("/", get(page_shell))
        .route("/login", get(page_shell))
        .route("/get-started", get(page_shell))
        .route("/platform", get(page_shell))
        .route("/platform/{*path}", get(page_shell));

    Router::new()
        .nest("/api", api_router)
        .merge(page_routes)
        .layer(middleware::from_fn(route_guard))
}

async fn page_shell() -> Html<&'static str> {
    Html("<!DOCTYPE html><html><head><title>FORK'D NUCES</title></head><body><div id=\"root\"></div></body></html>")
}

/// Run the server on the given listener. This function blocks until the server exits.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}

/// Start the server on the given port in a background task. Use port 0 to let the OS choose a random port.
/// Returns the actual address the server is listening on.
/// Note: For production use, prefer `run_server` directly in main.
pub async fn start_server(
    config: ServerConfig,
    port: u16,
) -> (tokio::task::JoinHandle<()>, SocketAddr) {
    let addr = format!("127.0.0.1:{}", port);
    let listener = TcpListener::bind(&addr).await.expect("Failed to bind");
    let local_addr = listener.local_addr().expect("Failed to get local address");

    let handle = tokio::spawn(async move {
        run_server(config, listener).await.ok();
    });

    (handle, local_addr)
}
