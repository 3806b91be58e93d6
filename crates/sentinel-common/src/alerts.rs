//! Alert classification for the `/ws/alerts` stream.
//!
//! The server pushes raw text frames (typically `ALERTA: {json}`). The client
//! does not parse them; it scans for the quoted severity markers as they
//! appear inside a JSON string field. Whitespace or encoding changes in the
//! payload can therefore degrade a real alert to `Info`.

use serde::{Deserialize, Serialize};

const CRITICAL_MARKER: &str = "\"CRITICAL\"";
const WARNING_MARKER: &str = "\"WARNING\"";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertSeverity {
    Critical,
    Warning,
    Info,
}

impl AlertSeverity {
    /// Classify a raw payload. CRITICAL wins over WARNING.
    pub fn classify(payload: &str) -> Self {
        if payload.contains(CRITICAL_MARKER) {
            AlertSeverity::Critical
        } else if payload.contains(WARNING_MARKER) {
            AlertSeverity::Warning
        } else {
            AlertSeverity::Info
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Critical => "CRITICAL",
            AlertSeverity::Warning => "WARNING",
            AlertSeverity::Info => "INFO",
        }
    }
}

impl std::fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One classified inbound payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertMessage {
    pub severity: AlertSeverity,
    pub payload: String,
}

impl AlertMessage {
    pub fn classify(payload: impl Into<String>) -> Self {
        let payload = payload.into();
        Self {
            severity: AlertSeverity::classify(&payload),
            payload,
        }
    }
}
