//! Rate limiting for credential-accepting endpoints.
//!
//! Token bucket with per-IP tracking on login and register, the two
//! endpoints that accept a password.

use axum::{
    Json,
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use serde_json::json;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;

/// Per-IP keyed rate limiter.
pub type IpLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Rate limiting configuration for the gateway.
#[derive(Clone)]
pub struct RateLimitConfig {
    /// Per-IP limiter for login/register (1 request per second, burst 5).
    pub credentials: Arc<IpLimiter>,
}

impl RateLimitConfig {
    /// Create rate limiters with production quotas.
    pub fn new() -> Self {
        Self::with_quota(
            Quota::per_second(NonZeroU32::new(1).unwrap())
                .allow_burst(NonZeroU32::new(5).unwrap()),
        )
    }

    /// Create rate limiters with an explicit quota.
    pub fn with_quota(quota: Quota) -> Self {
        Self {
            credentials: Arc::new(RateLimiter::keyed(quota)),
        }
    }

    /// Quotas high enough to never trip; for test setups.
    pub fn lenient() -> Self {
        Self::with_quota(Quota::per_second(NonZeroU32::new(10_000).unwrap()))
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Middleware for rate limiting credential endpoints.
pub async fn rate_limit_credentials(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let ip = client_ip(&request);

    match config.credentials.check_key(&ip) {
        Ok(_) => next.run(request).await,
        Err(_) => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({ "detail": "Too many attempts. Please try again later." })),
        )
            .into_response(),
    }
}

/// Extract the client IP from X-Forwarded-For (reverse proxy) or the
/// connection info. Requests with no discernible peer share one bucket.
fn client_ip(request: &Request) -> String {
    if let Some(forwarded_for) = request.headers().get("x-forwarded-for") {
        if let Ok(value) = forwarded_for.to_str() {
            if let Some(first_ip) = value.split(',').next() {
                let ip = first_ip.trim();
                if !ip.is_empty() {
                    return ip.to_string();
                }
            }
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
