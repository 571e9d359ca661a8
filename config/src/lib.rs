//! Configuration for the Switchyard server and clients.
//!
//! The config file is TOML and every field is optional:
//!
//! ```toml
//! [server]
//! bind = "127.0.0.1"
//! port = 3000
//! base_path = "/api/trpc"
//!
//! [query]
//! stale_time_ms = 30000
//!
//! [auth]
//! mode = "static"          # or "header"
//! static_user_id = "user_123"
//! header = "x-user-id"
//!
//! [log]
//! filter = "info,switchyard_server=debug"
//! ```
//!
//! String values may reference environment variables as `${VAR}`.

mod base_url;

pub use base_url::{
    BaseUrl, DEFAULT_PORT, PLATFORM_URL_ENV, PORT_ENV, resolve_base_url, resolve_port,
};

use serde::Deserialize;
use std::time::Duration;
use std::{env, fs, path::PathBuf};
use thiserror::Error;

/// Overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "SWITCHYARD_CONFIG";

pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_BASE_PATH: &str = "/api/trpc";
pub const DEFAULT_STALE_TIME_MS: u64 = 30_000;
pub const DEFAULT_STATIC_USER_ID: &str = "user_123";
pub const DEFAULT_AUTH_HEADER: &str = "x-user-id";
pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Default, Deserialize)]
pub struct SwitchyardConfig {
    pub server: Option<ServerConfig>,
    pub query: Option<QueryConfig>,
    pub auth: Option<AuthConfig>,
    pub log: Option<LogConfig>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl ConfigError {
    pub fn path(&self) -> &PathBuf {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ServerConfig {
    pub bind: Option<String>,
    pub port: Option<u16>,
    /// Mount point of the RPC endpoint. Default: `/api/trpc`.
    pub base_path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct QueryConfig {
    /// Staleness window for cached query results. Default: 30000.
    pub stale_time_ms: Option<u64>,
}

/// How the server establishes caller identity.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Every request runs as `static_user_id`.
    #[default]
    Static,
    /// Identity is read from a trusted request header.
    Header,
}

#[derive(Debug, Default, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub mode: AuthMode,
    pub static_user_id: Option<String>,
    pub header: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LogConfig {
    pub filter: Option<String>,
}

impl SwitchyardConfig {
    /// Load from the default location.
    ///
    /// A missing file yields `Ok(None)`; callers fall back to defaults.
    /// See [`SwitchyardConfig::load_or_default`].
    pub fn load() -> Result<Option<Self>, ConfigError> {
        match config_path() {
            Some(path) => Self::load_from(path),
            None => Ok(None),
        }
    }

    /// [`SwitchyardConfig::load`], with defaults standing in for a missing or
    /// broken file. Failures are already logged by `load_from`.
    #[must_use]
    pub fn load_or_default() -> Self {
        Self::load().ok().flatten().unwrap_or_default()
    }

    pub fn load_from(path: PathBuf) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read { path, source: err });
            }
        };

        match Self::parse(&content) {
            Ok(config) => Ok(Some(config)),
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse { path, source: err })
            }
        }
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }

    #[must_use]
    pub fn bind(&self) -> String {
        self.server
            .as_ref()
            .and_then(|s| s.bind.as_deref())
            .map(expand_env_vars)
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BIND.to_string())
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.server
            .as_ref()
            .and_then(|s| s.port)
            .unwrap_or(DEFAULT_PORT)
    }

    /// Base path, always with a leading slash and without a trailing one.
    #[must_use]
    pub fn base_path(&self) -> String {
        let raw = self
            .server
            .as_ref()
            .and_then(|s| s.base_path.as_deref())
            .map(expand_env_vars)
            .unwrap_or_else(|| DEFAULT_BASE_PATH.to_string());
        normalize_base_path(&raw)
    }

    /// Origin clients should call: platform host, else `localhost` on `PORT`
    /// or the configured port.
    #[must_use]
    pub fn base_url(&self) -> BaseUrl {
        BaseUrl::from_env(self.port())
    }

    #[must_use]
    pub fn stale_time(&self) -> Duration {
        let ms = self
            .query
            .as_ref()
            .and_then(|q| q.stale_time_ms)
            .unwrap_or(DEFAULT_STALE_TIME_MS);
        Duration::from_millis(ms)
    }

    #[must_use]
    pub fn auth_mode(&self) -> AuthMode {
        self.auth.as_ref().map(|a| a.mode).unwrap_or_default()
    }

    #[must_use]
    pub fn static_user_id(&self) -> String {
        self.auth
            .as_ref()
            .and_then(|a| a.static_user_id.as_deref())
            .map(expand_env_vars)
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_STATIC_USER_ID.to_string())
    }

    #[must_use]
    pub fn auth_header(&self) -> String {
        self.auth
            .as_ref()
            .and_then(|a| a.header.as_deref())
            .map(|h| h.trim().to_ascii_lowercase())
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| DEFAULT_AUTH_HEADER.to_string())
    }

    #[must_use]
    pub fn log_filter(&self) -> String {
        self.log
            .as_ref()
            .and_then(|l| l.filter.as_deref())
            .map(expand_env_vars)
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string())
    }
}

fn normalize_base_path(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        return String::new();
    }
    format!("/{trimmed}")
}

pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let var = &after[..end];
                if !var.is_empty() {
                    out.push_str(&env::var(var).unwrap_or_default());
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    out.push_str(rest);
    out
}

pub fn config_path() -> Option<PathBuf> {
    if let Ok(path) = env::var(CONFIG_PATH_ENV)
        && !path.trim().is_empty()
    {
        return Some(PathBuf::from(path));
    }
    dirs::home_dir().map(|home| home.join(".switchyard").join("config.toml"))
}
