//! Project browsing and creation proxy endpoints.
//!
//! Thin passthroughs: the backend owns the data and does the authoritative
//! token validation. The gateway only checks that an access cookie is
//! present and moves it into a bearer header. A 401 passed back from here
//! is what drives the fetch client's refresh-and-retry path.

use axum::{
    Json, Router,
    extract::{Request, State},
    response::{IntoResponse, Response},
    routing::get,
};

use super::error::ApiError;
use super::json_body;
use crate::backend::BackendClient;
use crate::cookies::{ACCESS_COOKIE_NAME, get_cookie};

#[derive(Clone)]
pub struct ProjectsState {
    pub backend: BackendClient,
}

pub fn router(state: ProjectsState) -> Router {
    Router::new()
        .route("/", get(list_projects).post(create_project))
        .with_state(state)
}

/// List/search projects, preserving the caller's query string.
async fn list_projects(
    State(state): State<ProjectsState>,
    request: Request,
) -> Result<Response, ApiError> {
    let access = require_access(&request)?;
    let query = request.uri().query().map(str::to_string);

    let reply = state
        .backend
        .forward_get("api/projects/", query.as_deref(), &access)
        .await?;
    Ok((reply.status, Json(reply.body)).into_response())
}

/// Create a project on behalf of the authenticated user.
async fn create_project(
    State(state): State<ProjectsState>,
    request: Request,
) -> Result<Response, ApiError> {
    let access = require_access(&request)?;

    let payload: serde_json::Value = json_body(request.into_body()).await?;
    let reply = state
        .backend
        .forward_post_authorized("api/projects/", &payload, &access)
        .await?;
    Ok((reply.status, Json(reply.body)).into_response())
}

pub(super) fn require_access(request: &Request) -> Result<String, ApiError> {
    get_cookie(request.headers(), ACCESS_COOKIE_NAME)
        .map(str::to_string)
        .ok_or_else(|| ApiError::unauthorized("Unauthenticated. Access token missing."))
}
