//! Terminal projection of client state.
//!
//! Pure functions from library results and events to display lines. `main`
//! only decides where a line goes and how it is painted.

use chrono::{DateTime, TimeZone};
use sentinel_client::subscriber::ConnectionStatus;
use sentinel_client::{
    AuthState, LoginError, LoginOutcome, ProtectedError, SensorError, StreamEvent,
};
use sentinel_common::alerts::AlertSeverity;
use sentinel_common::credential::Credential;
use sentinel_common::models::{SensorAccepted, UserRole};
use serde_json::Value;

/// How a line should be painted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Ok,
    Error,
    Warning,
    Critical,
    Plain,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub tone: Tone,
    pub text: String,
}

impl Line {
    fn new(tone: Tone, text: impl Into<String>) -> Self {
        Self {
            tone,
            text: text.into(),
        }
    }
}

// ── Session ─────────────────────────────────────────────────────────

pub fn auth_badge(state: &AuthState) -> Line {
    match state {
        AuthState::Authenticated { role } => {
            let mut text = format!("authenticated: {role}");
            if let Some(hint) = role_hint(role) {
                text.push_str(&format!(" ({hint})"));
            }
            Line::new(Tone::Ok, text)
        }
        AuthState::Unauthenticated => Line::new(Tone::Error, "not authenticated"),
    }
}

/// What a known role is allowed to do on the monitoring API.
fn role_hint(role: &str) -> Option<&'static str> {
    match role.parse::<UserRole>().ok()? {
        UserRole::Admin => Some("status and reset"),
        UserRole::Operator => Some("status"),
        UserRole::Viewer => Some("status, read-only"),
    }
}

pub fn token_line(credential: Option<&Credential>) -> Line {
    match credential {
        Some(c) => Line::new(Tone::Plain, format!("token: {}", c.preview())),
        None => Line::new(Tone::Plain, "token: none"),
    }
}

pub fn login_line(result: &Result<LoginOutcome, LoginError>) -> Line {
    match result {
        Ok(outcome) => {
            let mut text = format!("login ok, role: {}", outcome.role);
            if let Some(reported) = outcome
                .reported_role
                .as_deref()
                .filter(|r| *r != outcome.role)
            {
                text.push_str(&format!(" (server reports {reported})"));
            }
            Line::new(Tone::Ok, text)
        }
        Err(e) => Line::new(Tone::Error, format!("login error: {e}")),
    }
}

pub fn protected_line(result: &Result<Value, ProtectedError>) -> Line {
    match result {
        Ok(body) => Line::new(Tone::Ok, format!("ok: {body}")),
        Err(ProtectedError::NoCredential) => {
            Line::new(Tone::Error, "error: log in first (no credential held)")
        }
        Err(ProtectedError::Rejected { status, detail }) => Line::new(
            Tone::Error,
            format!("error {status} ({detail}): role not authorized or credential invalid"),
        ),
        Err(e) => Line::new(Tone::Error, format!("error: {e}")),
    }
}

pub fn sensor_line(result: &Result<SensorAccepted, SensorError>) -> Line {
    match result {
        Ok(accepted) => Line::new(Tone::Ok, accepted.message.clone()),
        Err(SensorError::Rejected { status, detail }) => {
            Line::new(Tone::Error, format!("error {status}: {detail}"))
        }
        Err(e) => Line::new(Tone::Error, format!("error: {e}")),
    }
}

/// Sensor id used when none is given: the type's initial, upper-cased,
/// followed by `-007`.
pub fn default_sensor_id(sensor_type: &str) -> String {
    let initial: String = sensor_type
        .chars()
        .next()
        .map(|c| c.to_uppercase().collect())
        .unwrap_or_default();
    format!("{initial}-007")
}

// ── Alert stream ────────────────────────────────────────────────────

pub fn connection_badge(status: ConnectionStatus) -> Line {
    match status {
        ConnectionStatus::Connecting => Line::new(Tone::Warning, "alerts: connecting"),
        ConnectionStatus::Open => Line::new(Tone::Ok, "alerts: connected and listening"),
        ConnectionStatus::Closed => Line::new(Tone::Error, "alerts: disconnected"),
    }
}

/// Render one stream event as a timestamped log line.
pub fn event_line<Tz: TimeZone>(event: &StreamEvent, at: &DateTime<Tz>) -> Line
where
    Tz::Offset: std::fmt::Display,
{
    let stamp = at.format("%H:%M:%S");
    let (tone, body) = match event {
        StreamEvent::Connecting { attempt: 1 } => {
            (Tone::Plain, "connecting to alert stream".to_string())
        }
        StreamEvent::Connecting { attempt } => {
            (Tone::Plain, format!("reconnecting (attempt {attempt})"))
        }
        StreamEvent::Connected { .. } => (Tone::Ok, "alert stream connected".to_string()),
        StreamEvent::Alert(alert) => {
            let tone = match alert.severity {
                AlertSeverity::Critical => Tone::Critical,
                AlertSeverity::Warning => Tone::Warning,
                AlertSeverity::Info => Tone::Plain,
            };
            let body = match alert.severity {
                AlertSeverity::Info => alert.payload.clone(),
                severity => format!("{severity} {}", alert.payload),
            };
            (tone, body)
        }
        StreamEvent::Diagnostic(text) => (Tone::Error, format!("stream error: {text}")),
        StreamEvent::Disconnected { retry_in } => (
            Tone::Warning,
            format!(
                "alert stream disconnected, reconnecting in {}s",
                retry_in.as_secs_f64()
            ),
        ),
        StreamEvent::Stopped => (Tone::Plain, "alert stream stopped".to_string()),
    };
    Line::new(tone, format!("[{stamp}] {body}"))
}
