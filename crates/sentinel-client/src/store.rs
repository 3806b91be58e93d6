//! Credential store: the single owner of session state.
//!
//! Holds the current credential in a lock-free slot (last write wins) with a
//! durable mirror behind a [`CredentialBackend`]. Consumers share one store
//! through an `Arc`; there is no global session.
//!
//! Decoding is fail-closed: a credential that does not decode is treated as
//! absent and purged from both the slot and storage, so a malformed value
//! never survives a restart.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use sentinel_common::credential::{Credential, DecodeError, DecodedCredential};
use tokio::sync::watch;

use crate::error::StoreError;
use crate::storage::{CredentialBackend, MemoryBackend};

/// Authentication status derived from the held credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Authenticated { role: String },
    Unauthenticated,
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated { .. })
    }

    pub fn role(&self) -> Option<&str> {
        match self {
            AuthState::Authenticated { role } => Some(role),
            AuthState::Unauthenticated => None,
        }
    }

    fn from_decoded(decoded: &DecodedCredential) -> Self {
        AuthState::Authenticated {
            role: decoded.role_or_unknown(),
        }
    }
}

impl std::fmt::Display for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthState::Authenticated { role } => write!(f, "authenticated: {role}"),
            AuthState::Unauthenticated => write!(f, "not authenticated"),
        }
    }
}

pub struct CredentialStore {
    slot: ArcSwapOption<Credential>,
    backend: Box<dyn CredentialBackend>,
    auth_tx: watch::Sender<AuthState>,
}

impl CredentialStore {
    /// Open a store over `backend` and restore any persisted session.
    pub fn open(backend: impl CredentialBackend + 'static) -> Self {
        let (auth_tx, _) = watch::channel(AuthState::Unauthenticated);
        let store = Self {
            slot: ArcSwapOption::empty(),
            backend: Box::new(backend),
            auth_tx,
        };
        store.current_auth_state();
        store
    }

    /// Store with no durable mirror.
    pub fn in_memory() -> Self {
        Self::open(MemoryBackend::new())
    }

    /// Read the persisted credential and make it the current one.
    ///
    /// A storage failure is logged and treated as "no credential".
    pub fn load(&self) -> Option<Credential> {
        let loaded = match self.backend.read() {
            Ok(raw) => raw.map(Credential::new),
            Err(e) => {
                tracing::warn!(error = %e, "failed to read persisted credential");
                None
            }
        };
        self.slot.store(loaded.clone().map(Arc::new));
        loaded
    }

    /// Persist `credential` (atomically, replacing any previous one) and make
    /// it current.
    ///
    /// A credential that does not decode is never stored: whatever was held
    /// before is purged as well and `StoreError::Undecodable` is returned.
    pub fn save(&self, credential: Credential) -> Result<DecodedCredential, StoreError> {
        let decoded = match credential.decode() {
            Ok(decoded) => decoded,
            Err(e) => {
                tracing::warn!(error = %e, "refusing malformed credential");
                self.clear();
                return Err(StoreError::Undecodable(e));
            }
        };
        self.backend.write(credential.as_str())?;
        self.slot.store(Some(Arc::new(credential)));
        self.publish(AuthState::from_decoded(&decoded));
        Ok(decoded)
    }

    /// Drop the credential from memory and storage.
    pub fn clear(&self) {
        self.slot.store(None);
        if let Err(e) = self.backend.remove() {
            tracing::warn!(error = %e, "failed to remove persisted credential");
        }
        self.publish(AuthState::Unauthenticated);
    }

    /// The current credential, without touching storage.
    pub fn credential(&self) -> Option<Credential> {
        self.slot.load_full().map(|c| Credential::clone(&c))
    }

    pub fn decode(&self, credential: &Credential) -> Result<DecodedCredential, DecodeError> {
        credential.decode()
    }

    /// Recompute the auth state from storage.
    ///
    /// Anything other than a decodable credential yields `Unauthenticated`
    /// and purges whatever was stored.
    pub fn current_auth_state(&self) -> AuthState {
        let state = match self.load() {
            Some(credential) => match self.decode(&credential) {
                Ok(decoded) => AuthState::from_decoded(&decoded),
                Err(e) => {
                    tracing::warn!(error = %e, "discarding malformed credential");
                    AuthState::Unauthenticated
                }
            },
            None => AuthState::Unauthenticated,
        };

        if state.is_authenticated() {
            self.publish(state.clone());
        } else {
            self.clear();
        }
        state
    }

    /// Watch auth state changes (for UI projections).
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.auth_tx.subscribe()
    }

    fn publish(&self, state: AuthState) {
        self.auth_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("has_credential", &self.slot.load().is_some())
            .finish_non_exhaustive()
    }
}
