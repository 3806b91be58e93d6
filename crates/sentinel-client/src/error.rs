//! Client error types.
//!
//! Every error here is terminal for the call that produced it. The only
//! self-healing failure is a stream closure, which the subscriber handles
//! internally and reports as events rather than errors.

use std::path::PathBuf;

use thiserror::Error;

/// Fallback message when a rejected login carries no usable `detail`.
pub const GENERIC_LOGIN_FAILURE: &str = "invalid credentials or server error";

/// Message surfaced when a request gets no HTTP response at all.
pub const NETWORK_FAILURE: &str = "network error while contacting the server";

/// Durable credential storage failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("storage document at {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },
    #[error("no data directory available for credential storage")]
    NoDataDir,
    /// The credential was refused before being stored.
    #[error("credential does not decode: {0}")]
    Undecodable(#[from] sentinel_common::credential::DecodeError),
}

/// Configuration loading failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid URL {url:?}: {reason}")]
    Url { url: String, reason: String },
    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Failures of the `/token` exchange.
#[derive(Debug, Error)]
pub enum LoginError {
    /// Field-level validation errors, flattened to `"<path>: <msg>"; ...`.
    #[error("{message}")]
    Validation { status: u16, message: String },
    /// The server refused the exchange.
    #[error("{message}")]
    Rejected { status: u16, message: String },
    /// No response at all.
    #[error("{}: {}", NETWORK_FAILURE, .0)]
    Network(String),
    /// 2xx, but the body had no usable `access_token`.
    #[error("malformed login response: {0}")]
    MalformedResponse(String),
    /// 2xx, but the issued credential does not decode; it was purged.
    #[error("server issued an unreadable credential: {0}")]
    InvalidCredential(#[from] sentinel_common::credential::DecodeError),
    #[error("could not persist credential: {0}")]
    Storage(#[from] StoreError),
}

impl LoginError {
    /// HTTP status, for the variants that got a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            LoginError::Validation { status, .. } | LoginError::Rejected { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }
}

/// Failures of calls to protected endpoints.
#[derive(Debug, Error)]
pub enum ProtectedError {
    /// Refused locally: nothing was sent.
    #[error("not logged in: no credential held")]
    NoCredential,
    /// Refused locally: the endpoint does not resolve against the base URL.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("HTTP {status}: {detail}")]
    Rejected { status: u16, detail: String },
    #[error("{}: {}", NETWORK_FAILURE, .0)]
    Network(String),
    #[error("response body is not JSON: {0}")]
    MalformedBody(String),
}

/// Failures of `POST /sensor/event`.
#[derive(Debug, Error)]
pub enum SensorError {
    #[error("HTTP {status}: {detail}")]
    Rejected { status: u16, detail: String },
    #[error("{}: {}", NETWORK_FAILURE, .0)]
    Network(String),
}

/// Stream transport failures. Always followed by a close and a retry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StreamError {
    #[error("connect failed: {0}")]
    Connect(String),
    /// The server answered the upgrade request with a non-101 status.
    #[error("upgrade rejected with HTTP {status}")]
    Rejected { status: u16 },
    #[error("transport error: {0}")]
    Transport(String),
}
