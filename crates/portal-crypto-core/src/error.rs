//! Cryptographic error types for `portal-crypto-core`.

use thiserror::Error;

/// Errors produced by cryptographic and encoding operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// Input was not valid base64 / base64url, or decoded bytes were not UTF-8.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// The operating system CSPRNG failed to produce bytes.
    #[error("random generation failed: {0}")]
    Random(String),

    /// Key pair generation or key parsing failed.
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    /// Digital signature creation failure (ECDSA).
    #[error("signature error: {0}")]
    Signature(String),

    /// Symmetric encryption failure (AES-256-GCM).
    #[error("encryption error: {0}")]
    Encryption(String),

    /// Authentication tag verification failed (wrong ciphertext, IV, or key).
    #[error("decryption failed: authentication tag mismatch")]
    Decryption,

    /// Password-based key derivation failed (PBKDF2).
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// Invalid key material (wrong length, corrupted bytes).
    #[error("invalid key material: {0}")]
    InvalidKeyMaterial(String),

    /// The requested algorithm is not available in this backend.
    #[error("unsupported algorithm: {0}")]
    Unsupported(String),
}
