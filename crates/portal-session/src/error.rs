//! Session error types for `portal-session`.

use portal_crypto_core::CryptoError;
use portal_store::StoreError;
use thiserror::Error;

/// Errors produced by token and session operations.
///
/// `Clone` so one refresh outcome can be handed to every waiting caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The token failed signature, expiry, issuer, audience, or revocation checks.
    #[error("invalid token")]
    InvalidToken,

    /// A refresh was requested with no current token held.
    #[error("no current token to refresh")]
    NoCurrentToken,

    /// Token lifetime must be positive and representable.
    #[error("invalid token ttl: {0}s")]
    InvalidTtl(u64),

    /// The signing secret is missing or unusable.
    #[error("signing secret unavailable: {0}")]
    Secret(String),

    /// Configuration could not be loaded or is inconsistent.
    #[error("configuration error: {0}")]
    Config(String),

    /// The refresh task ended without publishing a result.
    #[error("token refresh aborted")]
    RefreshAborted,

    /// Persistence failure (delegated from the store).
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Cryptographic failure (delegated from crypto-core).
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Claims could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
