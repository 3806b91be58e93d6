//! Shared types for the Sentinel client.
//!
//! This crate contains:
//! - **Credentials**: bearer token wrapper and fail-closed claim decoding
//! - **Data models**: login, error-detail, and sensor-event wire types
//! - **Alerts**: severity classification of inbound stream payloads

pub mod alerts;
pub mod credential;
pub mod models;
