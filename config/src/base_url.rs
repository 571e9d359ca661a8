//! Server origin resolution for clients.
//!
//! On a hosting platform the origin comes from a platform-provided variable;
//! everywhere else the client talks to a local server on a fixed port.

use std::env;
use std::fmt;

/// Hostname of the current deployment, without scheme.
pub const PLATFORM_URL_ENV: &str = "VERCEL_URL";
pub const PORT_ENV: &str = "PORT";
pub const DEFAULT_PORT: u16 = 3000;

/// An origin such as `https://app.example.com` or `http://localhost:3000`.
///
/// Never ends with a slash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseUrl(String);

impl BaseUrl {
    /// Resolve from the process environment, falling back to `default_port`.
    #[must_use]
    pub fn from_env(default_port: u16) -> Self {
        let platform = env::var(PLATFORM_URL_ENV).ok();
        let port = resolve_port(env::var(PORT_ENV).ok().as_deref(), default_port);
        resolve_base_url(platform.as_deref(), port)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BaseUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A usable `PORT` value wins; anything else falls back to `default_port`.
#[must_use]
pub fn resolve_port(port_env: Option<&str>, default_port: u16) -> u16 {
    port_env
        .and_then(|p| p.trim().parse::<u16>().ok())
        .unwrap_or(default_port)
}

/// Pure resolution rule; `from_env` feeds it the environment.
#[must_use]
pub fn resolve_base_url(platform_host: Option<&str>, port: u16) -> BaseUrl {
    match platform_host.map(str::trim).filter(|h| !h.is_empty()) {
        Some(host) => {
            let host = host
                .trim_start_matches("https://")
                .trim_start_matches("http://")
                .trim_end_matches('/');
            BaseUrl(format!("https://{host}"))
        }
        None => BaseUrl(format!("http://localhost:{port}")),
    }
}
