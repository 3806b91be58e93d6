//! Client configuration.
//!
//! Loaded from an optional TOML file; every key has a default so an empty
//! file (or no file) yields a working local setup.
//!
//! ```toml
//! base_url = "http://localhost:8000"
//! alerts_path = "/ws/alerts"
//! reconnect_delay_ms = 5000
//! # request_timeout_ms = 10000
//! # credential_file = "/var/lib/sentinel/credentials.json"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Url;
use serde::Deserialize;

use crate::error::{ConfigError, StoreError};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_ALERTS_PATH: &str = "/ws/alerts";
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 5000;

const CREDENTIAL_FILE_NAME: &str = "credentials.json";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// HTTP origin of the service. Endpoint paths are joined onto it.
    pub base_url: String,
    /// Path of the alert WebSocket, relative to `base_url`.
    pub alerts_path: String,
    /// Fixed delay between a stream close and the next connection attempt.
    pub reconnect_delay_ms: u64,
    /// Client-side HTTP timeout. Unset means requests wait for the transport.
    pub request_timeout_ms: Option<u64>,
    /// Where the credential is persisted. Unset means the platform data dir.
    pub credential_file: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            alerts_path: DEFAULT_ALERTS_PATH.to_string(),
            reconnect_delay_ms: DEFAULT_RECONNECT_DELAY_MS,
            request_timeout_ms: None,
            credential_file: None,
        }
    }
}

impl ClientConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        if input.trim().is_empty() {
            return Ok(ClientConfig::default());
        }
        let config: ClientConfig = toml::from_str(input)?;
        config.base()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let input = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&input)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    pub fn base(&self) -> Result<Url, ConfigError> {
        Url::parse(self.base_url.trim()).map_err(|e| ConfigError::Url {
            url: self.base_url.clone(),
            reason: e.to_string(),
        })
    }

    /// Resolve an endpoint against `base_url`.
    ///
    /// Absolute paths replace the base path; full URLs are used as-is.
    pub fn endpoint(&self, path: &str) -> Result<Url, ConfigError> {
        self.base()?.join(path).map_err(|e| ConfigError::Url {
            url: path.to_string(),
            reason: e.to_string(),
        })
    }

    /// WebSocket URL of the alert stream (`http` → `ws`, `https` → `wss`).
    pub fn alerts_url(&self) -> Result<Url, ConfigError> {
        let mut url = self.endpoint(&self.alerts_path)?;
        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => {
                return Err(ConfigError::Url {
                    url: url.to_string(),
                    reason: format!("unsupported scheme {other:?}"),
                });
            }
        };
        url.set_scheme(scheme).map_err(|()| ConfigError::Url {
            url: url.to_string(),
            reason: format!("cannot switch scheme to {scheme}"),
        })?;
        Ok(url)
    }

    /// Credential file location, falling back to `<data dir>/sentinel/credentials.json`.
    pub fn credential_path(&self) -> Result<PathBuf, StoreError> {
        if let Some(path) = &self.credential_file {
            return Ok(path.clone());
        }
        dirs::data_local_dir()
            .map(|dir| dir.join("sentinel").join(CREDENTIAL_FILE_NAME))
            .ok_or(StoreError::NoDataDir)
    }
}
