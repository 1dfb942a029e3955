//! HTTP client for the external REST backend.
//!
//! The backend owns all business data and performs the actual
//! authentication: it issues the opaque access/refresh token pair on login
//! and mints new access tokens on refresh. The gateway treats every token
//! as an opaque string and every non-2xx body as something to pass through
//! verbatim, so this client reports rejections with the original status
//! and body attached.

use axum::http::StatusCode;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;
use url::Url;

/// Errors from a backend call.
#[derive(Debug)]
pub enum BackendError {
    /// The backend answered with a non-2xx status. The body is kept
    /// verbatim so handlers can pass it through unchanged.
    Rejected { status: StatusCode, body: Value },
    /// Network-level failure reaching the backend.
    Transport(reqwest::Error),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::Rejected { status, .. } => {
                write!(f, "Backend rejected request with status {}", status)
            }
            BackendError::Transport(e) => write!(f, "Failed to reach backend: {}", e),
        }
    }
}

impl std::error::Error for BackendError {}

/// A verbatim backend response: status plus decoded JSON body.
#[derive(Debug, Clone)]
pub struct BackendReply {
    pub status: StatusCode,
    pub body: Value,
}

/// Successful login response from the backend.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginTokens {
    pub access: String,
    pub refresh: String,
    #[serde(default)]
    pub user: Value,
}

#[derive(Debug, Clone, Deserialize)]
struct RefreshTokens {
    access: String,
}

/// Client for the external REST backend.
#[derive(Clone)]
pub struct BackendClient {
    http: Client,
    base: Url,
}

impl BackendClient {
    /// Create a client for the backend at the given base URL.
    pub fn new(base: Url) -> Self {
        let http = Client::builder()
            .user_agent(concat!("forkd-gateway/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self { http, base }
    }

    fn endpoint(&self, path: &str) -> Url {
        self.base.join(path).expect("Invalid backend endpoint path")
    }

    /// Exchange credentials for a token pair.
    pub async fn login(&self, nu_email: &str, password: &str) -> Result<LoginTokens, BackendError> {
        debug!(email = %nu_email, "Forwarding login to backend");

        let response = self
            .http
            .post(self.endpoint("api/auth/login/"))
            .json(&json!({ "nu_email": nu_email, "password": password }))
            .send()
            .await
            .map_err(BackendError::Transport)?;

        let reply = read_reply(response).await?;
        let tokens: LoginTokens = serde_json::from_value(reply.body)
            .map_err(|_| malformed_reply("login response missing token fields"))?;
        Ok(tokens)
    }

    /// Exchange a refresh token for a new access token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<String, BackendError> {
        debug!("Forwarding token refresh to backend");

        let response = self
            .http
            .post(self.endpoint("api/token/refresh/"))
            .json(&json!({ "refresh": refresh_token }))
            .send()
            .await
            .map_err(BackendError::Transport)?;

        let reply = read_reply(response).await?;
        let tokens: RefreshTokens = serde_json::from_value(reply.body)
            .map_err(|_| malformed_reply("refresh response missing access token"))?;
        Ok(tokens.access)
    }

    /// Tell the backend to invalidate a refresh token. Best-effort: the
    /// logout handler logs failures instead of surfacing them.
    pub async fn revoke(&self, refresh_token: &str) -> Result<(), BackendError> {
        debug!("Notifying backend of logout");

        let response = self
            .http
            .post(self.endpoint("api/auth/logout/"))
            .json(&json!({ "refresh": refresh_token }))
            .send()
            .await
            .map_err(BackendError::Transport)?;

        read_reply(response).await?;
        Ok(())
    }

    /// Update the authenticated user's profile.
    pub async fn update_profile(
        &self,
        access_token: &str,
        fields: &Value,
    ) -> Result<Value, BackendError> {
        debug!("Forwarding profile update to backend");

        let response = self
            .http
            .put(self.endpoint("api/auth/me/update/"))
            .bearer_auth(access_token)
            .json(fields)
            .send()
            .await
            .map_err(BackendError::Transport)?;

        let reply = read_reply(response).await?;
        Ok(reply.body)
    }

    /// Forward a JSON POST and return the backend's reply verbatim,
    /// whatever its status. Used by the passthrough routes (register,
    /// email verification).
    pub async fn forward_post(&self, path: &str, body: &Value) -> Result<BackendReply, BackendError> {
        let response = self
            .http
            .post(self.endpoint(path))
            .json(body)
            .send()
            .await
            .map_err(BackendError::Transport)?;

        read_reply_verbatim(response).await
    }

    /// Forward a bearer-authorized GET, preserving the query string.
    pub async fn forward_get(
        &self,
        path: &str,
        query: Option<&str>,
        access_token: &str,
    ) -> Result<BackendReply, BackendError> {
        let mut url = self.endpoint(path);
        url.set_query(query);

        let response = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(BackendError::Transport)?;

        read_reply_verbatim(response).await
    }

    /// Forward a bearer-authorized JSON POST verbatim.
    pub async fn forward_post_authorized(
        &self,
        path: &str,
        body: &Value,
        access_token: &str,
    ) -> Result<BackendReply, BackendError> {
        let response = self
            .http
            .post(self.endpoint(path))
            .bearer_auth(access_token)
            .json(body)
            .send()
            .await
            .map_err(BackendError::Transport)?;

        read_reply_verbatim(response).await
    }
}

/// Decode a backend response, turning non-2xx statuses into `Rejected`.
async fn read_reply(response: reqwest::Response) -> Result<BackendReply, BackendError> {
    let reply = read_reply_verbatim(response).await?;
    if !reply.status.is_success() {
        return Err(BackendError::Rejected {
            status: reply.status,
            body: reply.body,
        });
    }
    Ok(reply)
}

/// Decode a backend response without interpreting the status. A body that
/// is not JSON decodes to null rather than failing the whole exchange.
async fn read_reply_verbatim(response: reqwest::Response) -> Result<BackendReply, BackendError> {
    let status = response.status();
    let body = response.json::<Value>().await.unwrap_or(Value::Null);
    Ok(BackendReply { status, body })
}

fn malformed_reply(detail: &str) -> BackendError {
    BackendError::Rejected {
        status: StatusCode::BAD_GATEWAY,
        body: json!({ "detail": detail }),
    }
}
