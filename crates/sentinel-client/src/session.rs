//! HTTP session client.
//!
//! Performs the `/token` exchange, calls protected endpoints with the held
//! bearer credential, and submits sensor events. The credential itself lives
//! in the shared [`CredentialStore`]; this client reads it at call time and
//! only writes it on a successful login.
//!
//! Nothing here retries. Every failure is returned to the caller.

use std::sync::Arc;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode, Url};
use sentinel_common::credential::Credential;
use sentinel_common::models::{ErrorBody, SensorAccepted, SensorEvent, TokenResponse};
use serde_json::Value;

use crate::config::ClientConfig;
use crate::error::{
    ConfigError, LoginError, ProtectedError, SensorError, StoreError, GENERIC_LOGIN_FAILURE,
};
use crate::store::{AuthState, CredentialStore};

const TOKEN_PATH: &str = "/token";
const SENSOR_EVENT_PATH: &str = "/sensor/event";

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub credential: Credential,
    /// Role decoded from the credential (`"unknown"` if the claim is absent).
    pub role: String,
    /// Role the server reported alongside the token, if any.
    pub reported_role: Option<String>,
}

pub struct SessionClient {
    http: reqwest::Client,
    base: Url,
    store: Arc<CredentialStore>,
}

impl SessionClient {
    pub fn new(config: &ClientConfig, store: Arc<CredentialStore>) -> Result<Self, ConfigError> {
        let base = config.base()?;
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        Ok(Self { http, base, store })
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    pub fn auth_state(&self) -> AuthState {
        self.store.current_auth_state()
    }

    pub fn logout(&self) {
        tracing::info!("logging out");
        self.store.clear();
    }

    fn url(&self, path: &str) -> Result<Url, String> {
        self.base.join(path).map_err(|e| e.to_string())
    }

    // ── Login ───────────────────────────────────────────────────────

    /// Exchange username/password for a credential.
    ///
    /// On any failure the store is re-evaluated, so a stale or malformed
    /// credential left over from an earlier session is purged.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome, LoginError> {
        let result = self.exchange(username, password).await;
        match &result {
            Ok(outcome) => {
                tracing::info!(username, role = %outcome.role, "logged in");
            }
            Err(e) => {
                tracing::warn!(username, error = %e, "login failed");
                self.store.current_auth_state();
            }
        }
        result
    }

    async fn exchange(&self, username: &str, password: &str) -> Result<LoginOutcome, LoginError> {
        let url = self
            .url(TOKEN_PATH)
            .map_err(|e| LoginError::Network(format!("invalid token endpoint: {e}")))?;

        let form: &[(&str, &str)] = &[
            ("grant_type", "password"),
            ("username", username),
            ("password", password),
            ("scope", ""),
            ("client_id", ""),
            ("client_secret", ""),
        ];

        let resp = self
            .http
            .post(url)
            .form(form)
            .send()
            .await
            .map_err(|e| LoginError::Network(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| LoginError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(login_rejection(status, &body));
        }

        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| LoginError::MalformedResponse(e.to_string()))?;

        let credential = Credential::new(token.access_token);
        let decoded = self
            .store
            .save(credential.clone())
            .map_err(|e| match e {
                StoreError::Undecodable(e) => LoginError::InvalidCredential(e),
                other => LoginError::Storage(other),
            })?;

        Ok(LoginOutcome {
            credential,
            role: decoded.role_or_unknown(),
            reported_role: token.role,
        })
    }

    // ── Protected endpoints ─────────────────────────────────────────

    /// Call an endpoint that requires the bearer credential.
    ///
    /// Refuses locally when no credential is held. A rejection is reported
    /// as-is and does not log the session out.
    pub async fn call_protected(
        &self,
        endpoint: &str,
        method: Method,
    ) -> Result<Value, ProtectedError> {
        let Some(credential) = self.store.credential() else {
            return Err(ProtectedError::NoCredential);
        };
        let url = self.url(endpoint).map_err(ProtectedError::InvalidEndpoint)?;

        tracing::debug!(%method, %url, "calling protected endpoint");

        let resp = self
            .http
            .request(method, url)
            .header(AUTHORIZATION, credential.bearer())
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await
            .map_err(|e| ProtectedError::Network(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| ProtectedError::Network(e.to_string()))?;

        if status.is_success() {
            if body.trim().is_empty() {
                return Ok(Value::Null);
            }
            return serde_json::from_str(&body)
                .map_err(|e| ProtectedError::MalformedBody(e.to_string()));
        }

        let detail = detail_or_reason(status, &body);
        tracing::warn!(status = status.as_u16(), %detail, "protected call rejected");
        Err(ProtectedError::Rejected {
            status: status.as_u16(),
            detail,
        })
    }

    // ── Sensors ─────────────────────────────────────────────────────

    /// Submit a sensor reading. Only `202 Accepted` counts as success.
    pub async fn submit_sensor_event(
        &self,
        event: &SensorEvent,
    ) -> Result<SensorAccepted, SensorError> {
        let url = self
            .url(SENSOR_EVENT_PATH)
            .map_err(|e| SensorError::Network(format!("invalid sensor endpoint: {e}")))?;

        let resp = self
            .http
            .post(url)
            .json(event)
            .send()
            .await
            .map_err(|e| SensorError::Network(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| SensorError::Network(e.to_string()))?;

        if status == StatusCode::ACCEPTED {
            tracing::debug!(sensor_type = %event.sensor_type, "sensor event accepted");
            return Ok(
                serde_json::from_str(&body).unwrap_or_else(|_| SensorAccepted {
                    message: body.clone(),
                    sensor: None,
                }),
            );
        }

        Err(SensorError::Rejected {
            status: status.as_u16(),
            detail: detail_or_reason(status, &body),
        })
    }
}

impl std::fmt::Debug for SessionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionClient")
            .field("base", &self.base.as_str())
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

/// Classify a non-2xx `/token` response.
fn login_rejection(status: StatusCode, body: &str) -> LoginError {
    let parsed = ErrorBody::from_text(body);
    let status = status.as_u16();
    match parsed.message().filter(|m| !m.is_empty()) {
        Some(message) if parsed.is_validation() => LoginError::Validation { status, message },
        Some(message) => LoginError::Rejected { status, message },
        None => LoginError::Rejected {
            status,
            message: GENERIC_LOGIN_FAILURE.to_string(),
        },
    }
}

/// The body's `detail`, or the status reason when there is none.
fn detail_or_reason(status: StatusCode, body: &str) -> String {
    ErrorBody::from_text(body)
        .message()
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request rejected")
                .to_string()
        })
}
