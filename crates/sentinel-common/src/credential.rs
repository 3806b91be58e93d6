//! Bearer credential handling.
//!
//! - **Credential**: the opaque `header.payload.signature` token issued at login
//! - **Decoding**: unverified claim extraction from the payload segment
//!
//! The client never verifies signatures; that is the server's job. Decoding
//! exists only to derive the displayed role, and it fails closed: anything
//! that is not exactly three segments with a JSON-object payload is an error.

use std::fmt;

use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::{Engine, alphabet};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Role reported when a decoded credential carries no `role` claim.
pub const UNKNOWN_ROLE: &str = "unknown";

const PREVIEW_CHARS: usize = 30;

const LENIENT: GeneralPurposeConfig = GeneralPurposeConfig::new()
    .with_encode_padding(false)
    .with_decode_padding_mode(DecodePaddingMode::Indifferent);

/// JWTs use the URL-safe alphabet; some issuers still emit the standard one.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, LENIENT);
const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, LENIENT);

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("expected 3 token segments, found {0}")]
    SegmentCount(usize),
    #[error("payload segment is not valid base64")]
    Encoding,
    #[error("payload is not a JSON object: {0}")]
    Payload(String),
}

// ── Credential ──────────────────────────────────────────────────────

/// A bearer token as issued by `/token`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    /// Value for an `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }

    /// Short display form: the first 30 characters followed by `...`.
    pub fn preview(&self) -> String {
        match self.0.char_indices().nth(PREVIEW_CHARS) {
            Some((idx, _)) => format!("{}...", &self.0[..idx]),
            None => self.0.clone(),
        }
    }

    /// Decode the claims carried in the middle segment.
    pub fn decode(&self) -> Result<DecodedCredential, DecodeError> {
        let parts: Vec<&str> = self.0.split('.').collect();
        if parts.len() != 3 {
            return Err(DecodeError::SegmentCount(parts.len()));
        }

        let bytes = URL_SAFE_LENIENT
            .decode(parts[1])
            .or_else(|_| STANDARD_LENIENT.decode(parts[1]))
            .map_err(|_| DecodeError::Encoding)?;

        let claims = match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Object(map)) => map,
            Ok(other) => {
                return Err(DecodeError::Payload(format!(
                    "found {}",
                    json_kind(&other)
                )));
            }
            Err(e) => return Err(DecodeError::Payload(e.to_string())),
        };

        let role = claims
            .get("role")
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(DecodedCredential { role, claims })
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Credential").field(&"<redacted>").finish()
    }
}

impl From<String> for Credential {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

/// Claims extracted from a credential without signature verification.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedCredential {
    /// The `role` claim, when present and a string.
    pub role: Option<String>,
    /// Every claim in the payload, `role` included.
    pub claims: Map<String, Value>,
}

impl DecodedCredential {
    pub fn role_or_unknown(&self) -> String {
        self.role.clone().unwrap_or_else(|| UNKNOWN_ROLE.to_string())
    }

    /// The `sub` claim, if the issuer set one.
    pub fn subject(&self) -> Option<&str> {
        self.claims.get("sub").and_then(Value::as_str)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
