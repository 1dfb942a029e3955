//! Auth gateway endpoints.
//!
//! - POST `/login` - Exchange credentials for session cookies
//! - POST `/logout` - Revoke the refresh token and clear cookies
//! - POST `/refresh` - Exchange the refresh cookie for a new access cookie
//! - PUT `/update-profile` - Forward a profile update with bearer auth
//! - POST `/register`, `/verify-email`, `/resend-verification-email` -
//!   passthrough proxies for the registration flow
//!
//! Every handler is a stateless proxy to the external backend; the only
//! side effects are cookie mutations. Tokens never reach page code; the
//! session cookies are HTTP-only.

use axum::{
    Json, Router,
    extract::{Request, State},
    http::{StatusCode, header::SET_COOKIE},
    middleware,
    response::{AppendHeaders, IntoResponse, Response},
    routing::{post, put},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use super::error::ApiError;
use super::json_body;
use crate::backend::{BackendClient, BackendError};
use crate::cookies::{
    ACCESS_COOKIE_NAME, ACCESS_TOKEN_MAX_AGE_SECS, REFRESH_COOKIE_NAME,
    REFRESH_TOKEN_MAX_AGE_SECS, clear_cookie, get_cookie, session_cookie,
};
use crate::rate_limit::{RateLimitConfig, rate_limit_credentials};

#[derive(Clone)]
pub struct AuthState {
    pub backend: BackendClient,
    pub secure_cookies: bool,
}

pub fn router(state: AuthState, limits: Arc<RateLimitConfig>) -> Router {
    // Credential-accepting endpoints get per-IP rate limiting.
    let limited = Router::new()
        .route("/login", post(login))
        .route("/register", post(register))
        .layer(middleware::from_fn_with_state(limits, rate_limit_credentials))
        .with_state(state.clone());

    let open = Router::new()
        .route("/logout", post(logout))
        .route("/refresh", post(refresh))
        .route("/update-profile", put(update_profile))
        .route("/verify-email", post(verify_email))
        .route("/resend-verification-email", post(resend_verification_email))
        .with_state(state);

    limited.merge(open)
}

#[derive(Deserialize)]
struct LoginRequest {
    nu_email: String,
    password: String,
}

/// Exchange credentials for the session cookie pair.
/// Backend errors pass through verbatim with the backend's status.
async fn login(
    State(state): State<AuthState>,
    request: Request,
) -> Result<impl IntoResponse, ApiError> {
    let creds: LoginRequest = json_body(request.into_body()).await?;

    let tokens = state.backend.login(&creds.nu_email, &creds.password).await?;

    info!(email = %creds.nu_email, "Login successful");

    let access_cookie = session_cookie(
        ACCESS_COOKIE_NAME,
        &tokens.access,
        ACCESS_TOKEN_MAX_AGE_SECS,
        state.secure_cookies,
    );
    let refresh_cookie = session_cookie(
        REFRESH_COOKIE_NAME,
        &tokens.refresh,
        REFRESH_TOKEN_MAX_AGE_SECS,
        state.secure_cookies,
    );

    Ok((
        StatusCode::OK,
        AppendHeaders([(SET_COOKIE, access_cookie), (SET_COOKIE, refresh_cookie)]),
        Json(json!({
            "user": tokens.user,
            "success": true,
            "message": "Login successful"
        })),
    ))
}

/// Logout - best-effort backend revocation, then clear both cookies.
/// Never fails from the caller's perspective, even with the backend down.
async fn logout(State(state): State<AuthState>, request: Request) -> impl IntoResponse {
    let (parts, _body) = request.into_parts();

    if let Some(refresh_token) = get_cookie(&parts.headers, REFRESH_COOKIE_NAME) {
        if let Err(e) = state.backend.revoke(refresh_token).await {
            warn!("Failed to notify backend of logout: {}", e);
        }
    }

    (
        StatusCode::OK,
        AppendHeaders([
            (SET_COOKIE, clear_cookie(ACCESS_COOKIE_NAME, state.secure_cookies)),
            (SET_COOKIE, clear_cookie(REFRESH_COOKIE_NAME, state.secure_cookies)),
        ]),
        Json(json!({ "success": true, "message": "Logout successful" })),
    )
}

/// Exchange the refresh cookie for a new access cookie.
/// The refresh cookie itself is left untouched; rotation is not performed.
/// A backend rejection means the session is unrecoverable: both cookies
/// are purged and the caller gets the 401 that sends it back to login.
async fn refresh(State(state): State<AuthState>, request: Request) -> Result<Response, ApiError> {
    let (parts, _body) = request.into_parts();

    let refresh_token = get_cookie(&parts.headers, REFRESH_COOKIE_NAME)
        .ok_or_else(|| ApiError::unauthorized("No refresh token"))?;

    match state.backend.refresh(refresh_token).await {
        Ok(access) => {
            let access_cookie = session_cookie(
                ACCESS_COOKIE_NAME,
                &access,
                ACCESS_TOKEN_MAX_AGE_SECS,
                state.secure_cookies,
            );
            Ok((
                StatusCode::OK,
                [(SET_COOKIE, access_cookie)],
                Json(json!({ "success": true })),
            )
                .into_response())
        }
        Err(BackendError::Rejected { status, .. }) => {
            info!(%status, "Backend rejected refresh token, purging session");
            Ok((
                StatusCode::UNAUTHORIZED,
                AppendHeaders([
                    (SET_COOKIE, clear_cookie(ACCESS_COOKIE_NAME, state.secure_cookies)),
                    (SET_COOKIE, clear_cookie(REFRESH_COOKIE_NAME, state.secure_cookies)),
                ]),
                Json(json!({ "detail": "Refresh failed" })),
            )
                .into_response())
        }
        Err(e @ BackendError::Transport(_)) => Err(e.into()),
    }
}

#[derive(Deserialize, Serialize)]
struct ProfileFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    skills: Option<Vec<String>>,
}

/// Forward a profile update with bearer authorization.
/// Requires the access cookie; its validity is the backend's call.
async fn update_profile(
    State(state): State<AuthState>,
    request: Request,
) -> Result<impl IntoResponse, ApiError> {
    let (parts, body) = request.into_parts();

    let access = get_cookie(&parts.headers, ACCESS_COOKIE_NAME)
        .ok_or_else(|| ApiError::unauthorized("Unauthenticated. Access token missing."))?
        .to_string();

    let fields: ProfileFields = json_body(body).await?;
    let fields = serde_json::to_value(fields)
        .map_err(|_| ApiError::bad_request("Invalid JSON body."))?;

    let data = state.backend.update_profile(&access, &fields).await?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "data": data,
            "success": true,
            "message": "Profile updated successfully"
        })),
    ))
}

/// Registration passthrough. No cookies are involved: login only happens
/// after the email is verified.
async fn register(
    State(state): State<AuthState>,
    request: Request,
) -> Result<Response, ApiError> {
    forward(&state, "api/auth/register/", request).await
}

async fn verify_email(
    State(state): State<AuthState>,
    request: Request,
) -> Result<Response, ApiError> {
    forward(&state, "api/auth/verify-email/", request).await
}

async fn resend_verification_email(
    State(state): State<AuthState>,
    request: Request,
) -> Result<Response, ApiError> {
    forward(&state, "api/auth/resend-verification-email/", request).await
}

/// Forward a JSON POST and replay the backend's status and body verbatim.
async fn forward(state: &AuthState, path: &str, request: Request) -> Result<Response, ApiError> {
    let payload: serde_json::Value = json_body(request.into_body()).await?;
    let reply = state.backend.forward_post(path, &payload).await?;
    Ok((reply.status, Json(reply.body)).into_response())
}
