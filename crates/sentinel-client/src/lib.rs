//! Sentinel client core.
//!
//! This crate contains:
//! - **Credential store**: the single owner of session state, mirrored to disk
//! - **Session client**: login, protected calls, sensor event submission
//! - **Alert subscriber**: one supervised WebSocket connection with fixed-delay reconnection
//! - **Config**: TOML client configuration
//!
//! Wiring is explicit. Build one [`CredentialStore`], share it through an
//! `Arc`, and hand it to the [`SessionClient`]:
//!
//! ```no_run
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//! use sentinel_client::{ClientConfig, CredentialStore, FileBackend, SessionClient};
//!
//! let config = ClientConfig::default();
//! let store = Arc::new(CredentialStore::open(FileBackend::new(config.credential_path()?)));
//! let client = SessionClient::new(&config, store)?;
//! let outcome = client.login("tony", "stark").await?;
//! println!("logged in as {}", outcome.role);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod session;
pub mod storage;
pub mod store;
pub mod subscriber;
pub mod ws;

pub use reqwest::Method;

pub use config::ClientConfig;
pub use error::{ConfigError, LoginError, ProtectedError, SensorError, StoreError, StreamError};
pub use session::{LoginOutcome, SessionClient};
pub use storage::{CredentialBackend, FileBackend, MemoryBackend};
pub use store::{AuthState, CredentialStore};
pub use subscriber::{ConnectionStatus, StreamEvent, StreamSubscriber, SubscriptionHandle};
pub use ws::{StreamConnector, WsConnector};
