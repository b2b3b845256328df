//! Challenge, nonce, and identifier generation from the OS CSPRNG.

use rand::rngs::OsRng;
use rand::RngCore;

use crate::encoding::encode_base64;

/// Default WebAuthn challenge length in bytes.
pub const DEFAULT_CHALLENGE_LEN: usize = 32;

/// Nonce length in bytes before base64 encoding.
pub const NONCE_LEN: usize = 32;

/// Identifier length in bytes before base64 encoding.
pub const ID_LEN: usize = 16;

/// Generate `len` uniformly random bytes.
#[must_use]
pub fn generate_challenge(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

/// Base64 of 32 random bytes, for CSP nonces and one-shot values.
#[must_use]
pub fn generate_nonce() -> String {
    encode_base64(&generate_challenge(NONCE_LEN))
}

/// Base64 of 16 random bytes.
#[must_use]
pub fn generate_id() -> String {
    encode_base64(&generate_challenge(ID_LEN))
}
