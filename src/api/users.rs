//! User browsing proxy endpoint.

use axum::{
    Json, Router,
    extract::{Request, State},
    response::{IntoResponse, Response},
    routing::get,
};

use super::error::ApiError;
use super::projects::require_access;
use crate::backend::BackendClient;

#[derive(Clone)]
pub struct UsersState {
    pub backend: BackendClient,
}

pub fn router(state: UsersState) -> Router {
    Router::new().route("/", get(list_users)).with_state(state)
}

/// List/search users, preserving the caller's query string.
async fn list_users(
    State(state): State<UsersState>,
    request: Request,
) -> Result<Response, ApiError> {
    let access = require_access(&request)?;
    let query = request.uri().query().map(str::to_string);

    let reply = state
        .backend
        .forward_get("api/users/", query.as_deref(), &access)
        .await?;
    Ok((reply.status, Json(reply.body)).into_response())
}
