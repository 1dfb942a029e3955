mod auth;
mod error;
mod projects;
mod users;

use axum::Router;
use axum::body::{Body, to_bytes};
use serde::de::DeserializeOwned;
use std::sync::Arc;

use crate::backend::BackendClient;
use crate::rate_limit::RateLimitConfig;
use error::ApiError;

pub use auth::AuthState;

/// Largest request body the gateway will buffer for forwarding.
const BODY_LIMIT: usize = 64 * 1024;

/// Create the API router.
pub fn create_api_router(
    backend: BackendClient,
    secure_cookies: bool,
    limits: RateLimitConfig,
) -> Router {
    let limits = Arc::new(limits);

    let auth_state = auth::AuthState {
        backend: backend.clone(),
        secure_cookies,
    };

    let projects_state = projects::ProjectsState {
        backend: backend.clone(),
    };

    let users_state = users::UsersState { backend };

    Router::new()
        .nest("/auth", auth::router(auth_state, limits))
        .nest("/projects", projects::router(projects_state))
        .nest("/users", users::router(users_state))
}

/// Buffer and decode a JSON request body.
pub(crate) async fn json_body<T: DeserializeOwned>(body: Body) -> Result<T, ApiError> {
    let bytes = to_bytes(body, BODY_LIMIT)
        .await
        .map_err(|_| ApiError::bad_request("Invalid JSON body."))?;
    serde_json::from_slice(&bytes).map_err(|_| ApiError::bad_request("Invalid JSON body."))
}
