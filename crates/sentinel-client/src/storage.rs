//! Durable client-side storage for the credential.
//!
//! A tiny key/value document, the native counterpart of browser local
//! storage. Only one key is used (`access_token`); absence is a valid state.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::error::StoreError;

/// Storage key holding the raw credential string.
pub const CREDENTIAL_KEY: &str = "access_token";

/// Backing store for the persisted credential.
///
/// Writes must be atomic: a reader never observes a partially written value.
pub trait CredentialBackend: Send + Sync {
    fn read(&self) -> Result<Option<String>, StoreError>;
    fn write(&self, raw: &str) -> Result<(), StoreError>;
    fn remove(&self) -> Result<(), StoreError>;
}

// ── File ────────────────────────────────────────────────────────────

/// JSON document on disk, replaced via write-to-temp then rename.
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn read_document(&self) -> Result<BTreeMap<String, String>, StoreError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(self.io_err(e)),
        };
        if text.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&text).map_err(|e| StoreError::Corrupt {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }

    fn write_document(&self, doc: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
            }
        }

        let json = serde_json::to_vec_pretty(doc).map_err(|e| StoreError::Corrupt {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        std::fs::write(&tmp, json).map_err(|e| self.io_err(e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| {
            let _ = std::fs::remove_file(&tmp);
            self.io_err(e)
        })
    }
}

impl CredentialBackend for FileBackend {
    fn read(&self) -> Result<Option<String>, StoreError> {
        Ok(self.read_document()?.remove(CREDENTIAL_KEY))
    }

    fn write(&self, raw: &str) -> Result<(), StoreError> {
        // Unknown keys survive; only a corrupt document is replaced.
        let mut doc = match self.read_document() {
            Ok(doc) => doc,
            Err(StoreError::Corrupt { .. }) => BTreeMap::new(),
            Err(e) => return Err(e),
        };
        doc.insert(CREDENTIAL_KEY.to_string(), raw.to_string());
        self.write_document(&doc)
    }

    fn remove(&self) -> Result<(), StoreError> {
        let mut doc = match self.read_document() {
            Ok(doc) => doc,
            Err(StoreError::Corrupt { .. }) => BTreeMap::new(),
            Err(e) => return Err(e),
        };
        let had_key = doc.remove(CREDENTIAL_KEY).is_some();
        if doc.is_empty() {
            return match std::fs::remove_file(&self.path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(self.io_err(e)),
            };
        }
        if had_key {
            self.write_document(&doc)
        } else {
            Ok(())
        }
    }
}

// ── Memory ──────────────────────────────────────────────────────────

/// In-process storage for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    value: Mutex<Option<String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(raw: impl Into<String>) -> Self {
        Self {
            value: Mutex::new(Some(raw.into())),
        }
    }
}

impl CredentialBackend for MemoryBackend {
    fn read(&self) -> Result<Option<String>, StoreError> {
        Ok(self
            .value
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn write(&self, raw: &str) -> Result<(), StoreError> {
        *self.value.lock().unwrap_or_else(PoisonError::into_inner) = Some(raw.to_string());
        Ok(())
    }

    fn remove(&self) -> Result<(), StoreError> {
        *self.value.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}
