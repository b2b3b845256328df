//! `portal-store`: persistent storage for the secure portal.
//!
//! A single `SQLite` database holding WebAuthn credentials, session tokens,
//! the revoked-token list, and the append-only audit log. The schema is
//! versioned with forward-only embedded migrations.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::arithmetic_side_effects))]

pub mod audit;
pub mod credentials;
pub mod db;
pub mod error;
pub mod ip_lookup;
pub mod revocation;
pub mod tokens;

pub use audit::{events, SessionLogEntry, DEFAULT_LOG_LIMIT};
pub use credentials::{NewCredential, StoredCredential};
pub use db::{SecureStore, StoreOptions, SCHEMA_VERSION};
pub use error::StoreError;
pub use ip_lookup::{HttpIpLookup, IpLookup, StaticIpLookup, DEFAULT_IP_LOOKUP_URL, UNKNOWN_IP};
pub use tokens::TokenRecord;
