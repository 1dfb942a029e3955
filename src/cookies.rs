//! Session cookie parsing and formatting.
//!
//! Both tokens are opaque strings minted by the external backend; the
//! gateway never inspects their contents, it only moves them between
//! HTTP-only cookies and the backend's bearer-token protocol.

use axum::http::header;

/// Cookie name for the access token (short-lived, 15 minutes).
pub const ACCESS_COOKIE_NAME: &str = "access_token";

/// Cookie name for the refresh token (long-lived, 7 days).
pub const REFRESH_COOKIE_NAME: &str = "refresh_token";

/// Access token cookie lifetime: 15 minutes.
pub const ACCESS_TOKEN_MAX_AGE_SECS: u64 = 15 * 60;

/// Refresh token cookie lifetime: 7 days.
pub const REFRESH_TOKEN_MAX_AGE_SECS: u64 = 7 * 24 * 60 * 60;

/// Extract a cookie value from the Cookie header.
pub fn get_cookie<'a>(headers: &'a axum::http::HeaderMap, name: &str) -> Option<&'a str> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    for part in cookie_header.split(';') {
        let part = part.trim();
        if let Some((key, value)) = part.split_once('=') {
            if key.trim() == name {
                return Some(value.trim());
            }
        }
    }
    None
}

/// Format a Set-Cookie header value for a session token.
/// All session cookies are HttpOnly, SameSite=Lax, Path=/.
pub fn session_cookie(name: &str, value: &str, max_age_secs: u64, secure: bool) -> String {
    let secure = if secure { "; Secure" } else { "" };
    format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}{}",
        name, value, max_age_secs, secure
    )
}

/// Format a Set-Cookie header value that clears a session cookie.
pub fn clear_cookie(name: &str, secure: bool) -> String {
    let secure = if secure { "; Secure" } else { "" };
    format!(
        "{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0{}",
        name, secure
    )
}
