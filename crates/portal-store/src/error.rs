//! Storage error types for `portal-store`.

use portal_crypto_core::CryptoError;
use thiserror::Error;

/// Errors produced by store operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Cryptographic operation failed (delegated from crypto-core).
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// `SQLite` error not covered by a more specific variant.
    #[error("database error: {0}")]
    Database(String),

    /// A uniqueness constraint rejected the write (duplicate credential id,
    /// duplicate token string, duplicate log timestamp).
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// Credential id is not base64 decoding to 16..=512 bytes.
    #[error("invalid credential id")]
    InvalidCredentialId,

    /// Token TTL must be strictly positive.
    #[error("invalid token ttl: {0}s")]
    InvalidTtl(u64),

    /// Migration error during schema upgrade.
    #[error("migration error: {0}")]
    Migration(String),

    /// A stored row could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The IP lookup collaborator failed. Never surfaces from `log_event`,
    /// which substitutes `"unknown"`.
    #[error("ip lookup failed: {0}")]
    IpLookup(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(ref ffi_err, _) = err {
            if ffi_err.code == rusqlite::ffi::ErrorCode::ConstraintViolation {
                return Self::ConstraintViolation(err.to_string());
            }
        }
        Self::Database(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
