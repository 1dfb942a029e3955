//! Route guard middleware.
//!
//! Runs before page handlers and decides, per navigation, whether the
//! visitor may reach a protected area. The guard only looks at cookie
//! presence: an expired-but-present access token still passes; validity
//! is discovered downstream when the first data request hits a 401 and
//! the fetch client refreshes. Keeping the guard free of network calls
//! makes it cheap enough to run on every navigation.

use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use crate::cookies::{ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME, get_cookie};

/// Path prefixes that require a session (access or refresh cookie).
const PROTECTED_PREFIXES: &[&str] = &["/platform"];

/// Auth-only pages; logged-in visitors are bounced back to the platform.
const AUTH_PAGE_PREFIXES: &[&str] = &["/login", "/get-started"];

/// Default landing path for authenticated visitors.
pub const PLATFORM_PATH: &str = "/platform";

/// Login page path, the redirect target for unauthenticated visitors.
pub const LOGIN_PATH: &str = "/login";

/// Static classification of a request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    /// Requires a session cookie to enter.
    Protected,
    /// Login / registration pages, off-limits once logged in.
    AuthPage,
    /// No restrictions.
    Open,
}

/// Outcome of the guard for a single navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    RedirectToLogin,
    RedirectToPlatform,
}

/// Classify a request path by prefix.
pub fn classify(path: &str) -> RouteClass {
    if AUTH_PAGE_PREFIXES.iter().any(|p| path.starts_with(p)) {
        return RouteClass::AuthPage;
    }
    if PROTECTED_PREFIXES.iter().any(|p| path.starts_with(p)) {
        return RouteClass::Protected;
    }
    RouteClass::Open
}

/// The guard decision table. First matching rule wins:
/// 1. auth page + any session cookie -> platform
/// 2. protected + no cookies at all  -> login
/// 3. everything else                -> allow
pub fn decide(class: RouteClass, has_access: bool, has_refresh: bool) -> GuardDecision {
    let has_session = has_access || has_refresh;
    match class {
        RouteClass::AuthPage if has_session => GuardDecision::RedirectToPlatform,
        RouteClass::Protected if !has_session => GuardDecision::RedirectToLogin,
        _ => GuardDecision::Allow,
    }
}

/// Axum middleware applying the guard to navigable requests.
pub async fn route_guard(request: Request, next: Next) -> Response {
    let path = request.uri().path();
    let headers = request.headers();

    let has_access = get_cookie(headers, ACCESS_COOKIE_NAME).is_some();
    let has_refresh = get_cookie(headers, REFRESH_COOKIE_NAME).is_some();

    match decide(classify(path), has_access, has_refresh) {
        GuardDecision::Allow => next.run(request).await,
        GuardDecision::RedirectToLogin => Redirect::temporary(LOGIN_PATH).into_response(),
        GuardDecision::RedirectToPlatform => Redirect::temporary(PLATFORM_PATH).into_response(),
    }
}
