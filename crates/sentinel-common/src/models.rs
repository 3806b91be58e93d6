//! Wire models for the Sentinel service.
//!
//! These mirror the request/response bodies of the HTTP API the client talks
//! to. The server owns the shapes; the client only reads the fields it needs
//! and tolerates extra ones.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── Auth ────────────────────────────────────────────────────────────

/// Successful `/token` response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

/// Roles the service issues. Credentials carry the role as a free string;
/// this enum is for display and local checks only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    Operator,
    Viewer,
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserRole::Admin => write!(f, "admin"),
            UserRole::Operator => write!(f, "operator"),
            UserRole::Viewer => write!(f, "viewer"),
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(UserRole::Admin),
            "operator" => Ok(UserRole::Operator),
            "viewer" => Ok(UserRole::Viewer),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

// ── Errors ──────────────────────────────────────────────────────────

/// Error body returned on non-2xx responses.
///
/// `detail` is usually a string, but request validation failures return a
/// list of `{loc, msg}` entries, and some handlers return arbitrary JSON.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Option<Value>,
}

impl ErrorBody {
    /// Parse an error body, tolerating non-JSON payloads.
    pub fn from_text(text: &str) -> Self {
        serde_json::from_str(text).unwrap_or_default()
    }

    pub fn message(&self) -> Option<String> {
        self.detail.as_ref().map(describe_detail)
    }

    /// True when `detail` is a list of field-level validation issues.
    pub fn is_validation(&self) -> bool {
        matches!(self.detail, Some(Value::Array(_)))
    }
}

/// One entry of a validation-error `detail` list.
#[derive(Debug, Clone, Deserialize)]
pub struct ValidationIssue {
    #[serde(default)]
    pub loc: Vec<Value>,
    pub msg: String,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let path: Vec<String> = self
            .loc
            .iter()
            .map(|segment| match segment {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect();
        write!(f, "{}: {}", path.join(" -> "), self.msg)
    }
}

/// Render an error `detail` value as a human-readable message.
///
/// Strings are used verbatim. Validation lists become
/// `"<loc> -> <loc>: <msg>"` entries joined with `"; "`. Anything else is
/// rendered as compact JSON.
pub fn describe_detail(detail: &Value) -> String {
    match detail {
        Value::String(s) => s.clone(),
        Value::Array(entries) => entries
            .iter()
            .map(|entry| match ValidationIssue::deserialize(entry) {
                Ok(issue) => issue.to_string(),
                Err(_) => entry.to_string(),
            })
            .collect::<Vec<_>>()
            .join("; "),
        other => other.to_string(),
    }
}

// ── Sensors ─────────────────────────────────────────────────────────

/// Body of `POST /sensor/event`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorEvent {
    pub sensor_type: String,
    pub sensor_id: String,
    /// Unix seconds, fractional.
    pub timestamp: f64,
    pub value: String,
}

impl SensorEvent {
    /// Build an event stamped with the current time.
    pub fn now(
        sensor_type: impl Into<String>,
        sensor_id: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        let millis = Utc::now().timestamp_millis();
        Self {
            sensor_type: sensor_type.into(),
            sensor_id: sensor_id.into(),
            timestamp: millis as f64 / 1000.0,
            value: value.into(),
        }
    }
}

/// `202 Accepted` body of `POST /sensor/event`.
#[derive(Debug, Clone, Deserialize)]
pub struct SensorAccepted {
    pub message: String,
    #[serde(default)]
    pub sensor: Option<String>,
}
