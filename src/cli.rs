//! CLI argument parsing, validation, and startup helpers.

use crate::ServerConfig;
use crate::rate_limit::RateLimitConfig;
use clap::Parser;
use tracing::error;
use url::Url;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "forkd-gateway",
    about = "Session gateway for the FORK'D NUCES collaboration platform"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "3000")]
    pub port: u16,

    /// Base URL of the external REST backend
    #[arg(long, env = "BACKEND_URL", default_value = "http://localhost:8000")]
    pub backend_url: String,

    /// Set the Secure flag on session cookies (use when serving over HTTPS)
    #[arg(long)]
    pub secure_cookies: bool,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Validate the backend base URL.
/// Returns None and logs an error if the URL is unusable.
pub fn validate_backend_url(backend_url: &str) -> Option<Url> {
    // A trailing slash makes Url::join treat the whole path as a base.
    let normalized = if backend_url.ends_with('/') {
        backend_url.to_string()
    } else {
        format!("{}/", backend_url)
    };

    let url = match Url::parse(&normalized) {
        Ok(url) => url,
        Err(e) => {
            error!(url = %backend_url, error = %e, "Invalid backend URL");
            return None;
        }
    };

    if url.scheme() != "http" && url.scheme() != "https" {
        error!(url = %backend_url, "Backend URL must be http or https");
        return None;
    }

    Some(url)
}

/// Build the server configuration from validated arguments.
pub fn build_config(backend_url: Url, secure_cookies: bool) -> ServerConfig {
    ServerConfig {
        backend_url,
        secure_cookies,
        rate_limits: RateLimitConfig::new(),
    }
}
