//! Authenticated fetch client.
//!
//! Wraps a cookie-carrying HTTP client so that callers never deal with
//! access-token expiry themselves: a 401 triggers one shared refresh call
//! against the gateway, then the original request is retried exactly once.
//!
//! The refresh slot is the one piece of shared mutable state. Whichever
//! call first observes a 401 with the slot empty installs the refresh
//! future; every other concurrent 401 awaits that same future instead of
//! issuing its own refresh. The slot is cleared when the refresh settles,
//! success or failure, so a later expiry can start a fresh cycle.

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use reqwest::StatusCode;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use url::Url;

/// Default deadline for a refresh cycle. A hung refresh call is cut off
/// and treated as a failed refresh, bounding how long waiters can stall.
pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors surfaced by [`AuthFetch`].
#[derive(Debug)]
pub enum FetchError {
    /// Network-level failure issuing a request. Business errors are not
    /// wrapped; any non-401 response comes back as a plain `Response`.
    Transport(reqwest::Error),
    /// The session could not be recovered; the caller is logged out.
    SessionExpired(RefreshError),
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::Transport(e) => write!(f, "Request failed: {}", e),
            FetchError::SessionExpired(e) => write!(f, "Session expired: {}", e),
        }
    }
}

impl std::error::Error for FetchError {}

/// Why a refresh cycle failed. Clone, because every waiter on the shared
/// refresh future receives the same outcome.
#[derive(Debug, Clone)]
pub enum RefreshError {
    /// The gateway rejected the refresh; the session cookies are gone.
    Rejected(StatusCode),
    /// The refresh call did not complete within the deadline.
    TimedOut,
    /// Network failure reaching the gateway.
    Transport(Arc<reqwest::Error>),
}

impl std::fmt::Display for RefreshError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefreshError::Rejected(status) => write!(f, "Refresh rejected with status {}", status),
            RefreshError::TimedOut => write!(f, "Refresh timed out"),
            RefreshError::Transport(e) => write!(f, "Refresh transport failure: {}", e),
        }
    }
}

type SharedRefresh = Shared<BoxFuture<'static, Result<(), RefreshError>>>;

struct Inner {
    http: reqwest::Client,
    base: Url,
    refresh_url: Url,
    refresh_timeout: Duration,
    refresh_slot: Mutex<Option<SharedRefresh>>,
    on_session_expired: Option<Box<dyn Fn() + Send + Sync>>,
}

/// Client for the gateway with transparent refresh-and-retry.
///
/// Cheap to clone; clones share the cookie jar and the refresh slot.
#[derive(Clone)]
pub struct AuthFetch {
    inner: Arc<Inner>,
}

impl AuthFetch {
    /// Create a client for the gateway at the given base URL.
    pub fn new(base: Url) -> Self {
        Self::builder(base).build()
    }

    pub fn builder(base: Url) -> AuthFetchBuilder {
        AuthFetchBuilder {
            base,
            refresh_timeout: DEFAULT_REFRESH_TIMEOUT,
            on_session_expired: None,
        }
    }

    /// Issue a request, transparently refreshing the session on a 401.
    ///
    /// Any response other than 401 is returned unchanged. On a 401 the
    /// shared refresh runs (at most one in flight across all clones) and
    /// the request is retried exactly once; the retry's response comes
    /// back whatever its status. A request whose body cannot be cloned
    /// (streaming) is issued once and returned as-is, never retried.
    pub async fn send(&self, request: reqwest::Request) -> Result<reqwest::Response, FetchError> {
        let retry = request.try_clone();

        let response = self
            .inner
            .http
            .execute(request)
            .await
            .map_err(FetchError::Transport)?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let Some(retry) = retry else {
            return Ok(response);
        };

        // Access token expired - wait for the (single) refresh.
        if let Err(e) = self.refresh_access_token().await {
            warn!("Session refresh failed: {}", e);
            if let Some(hook) = &self.inner.on_session_expired {
                hook();
            }
            return Err(FetchError::SessionExpired(e));
        }

        // Retry the original request once. A second 401 is the caller's
        // to deal with; there is no retry loop.
        self.inner
            .http
            .execute(retry)
            .await
            .map_err(FetchError::Transport)
    }

    /// GET a gateway path.
    pub async fn get(&self, path: &str) -> Result<reqwest::Response, FetchError> {
        let request = self
            .request(reqwest::Method::GET, path)
            .build()
            .map_err(FetchError::Transport)?;
        self.send(request).await
    }

    /// POST a JSON body to a gateway path.
    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<reqwest::Response, FetchError> {
        let request = self
            .request(reqwest::Method::POST, path)
            .json(body)
            .build()
            .map_err(FetchError::Transport)?;
        self.send(request).await
    }

    /// PUT a JSON body to a gateway path.
    pub async fn put_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<reqwest::Response, FetchError> {
        let request = self
            .request(reqwest::Method::PUT, path)
            .json(body)
            .build()
            .map_err(FetchError::Transport)?;
        self.send(request).await
    }

    /// Start a request against a gateway path. The result can be built
    /// and passed to [`send`](Self::send).
    pub fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = self
            .inner
            .base
            .join(path.trim_start_matches('/'))
            .expect("Invalid gateway path");
        self.inner.http.request(method, url)
    }

    /// Await the shared refresh, installing it if no cycle is in flight.
    async fn refresh_access_token(&self) -> Result<(), RefreshError> {
        let shared = {
            let mut slot = self
                .inner
                .refresh_slot
                .lock()
                .expect("refresh slot lock poisoned");
            match slot.as_ref() {
                Some(in_flight) => in_flight.clone(),
                None => {
                    let fresh = Self::run_refresh(self.inner.clone()).boxed().shared();
                    *slot = Some(fresh.clone());
                    fresh
                }
            }
        };

        // All callers wait on the same future; the waiters' polls drive it.
        shared.await
    }

    /// One full refresh cycle under a deadline. Clears the slot before
    /// delivering the outcome, so the next expiry starts a fresh cycle.
    async fn run_refresh(inner: Arc<Inner>) -> Result<(), RefreshError> {
        let result = match timeout(inner.refresh_timeout, Self::call_refresh(&inner)).await {
            Ok(result) => result,
            Err(_) => Err(RefreshError::TimedOut),
        };

        *inner
            .refresh_slot
            .lock()
            .expect("refresh slot lock poisoned") = None;

        match &result {
            Ok(()) => info!("Access token refreshed"),
            Err(e) => debug!("Refresh cycle failed: {}", e),
        }
        result
    }

    async fn call_refresh(inner: &Inner) -> Result<(), RefreshError> {
        debug!("Refreshing access token");

        let response = inner
            .http
            .post(inner.refresh_url.clone())
            .send()
            .await
            .map_err(|e| RefreshError::Transport(Arc::new(e)))?;

        if !response.status().is_success() {
            return Err(RefreshError::Rejected(response.status()));
        }
        Ok(())
    }
}

/// Builder for [`AuthFetch`].
pub struct AuthFetchBuilder {
    base: Url,
    refresh_timeout: Duration,
    on_session_expired: Option<Box<dyn Fn() + Send + Sync>>,
}

impl AuthFetchBuilder {
    /// Override the refresh deadline.
    pub fn refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = timeout;
        self
    }

    /// Install a hook invoked when the session cannot be recovered: the
    /// native stand-in for navigating the browser back to the login page.
    pub fn on_session_expired(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_session_expired = Some(Box::new(hook));
        self
    }

    pub fn build(self) -> AuthFetch {
        let http = reqwest::Client::builder()
            .user_agent(concat!("forkd-client/", env!("CARGO_PKG_VERSION")))
            .cookie_store(true)
            .build()
            .expect("Failed to create HTTP client");

        let refresh_url = self
            .base
            .join("api/auth/refresh")
            .expect("Invalid gateway base URL");

        AuthFetch {
            inner: Arc::new(Inner {
                http,
                base: self.base,
                refresh_url,
                refresh_timeout: self.refresh_timeout,
                refresh_slot: Mutex::new(None),
                on_session_expired: self.on_session_expired,
            }),
        }
    }
}
