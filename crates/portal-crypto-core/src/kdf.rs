//! PBKDF2-HMAC-SHA256 password-based key derivation.
//!
//! Parameters are fixed: 100 000 iterations, 256-bit output, used directly
//! as an AES-256-GCM key. Password strength policy belongs to the caller.

use std::num::NonZeroU32;

use ring::pbkdf2;
use zeroize::Zeroize;

use crate::error::CryptoError;
use crate::memory::SecretBytes;
use crate::symmetric::{AesKey, KEY_LEN};

/// PBKDF2 iteration count.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Derive a non-exportable AES-256-GCM key from `password` and `salt`.
///
/// Both inputs are taken as UTF-8 bytes. Deterministic for a given pair.
///
/// # Errors
///
/// Returns `CryptoError::KeyDerivation` if the iteration count is invalid.
pub fn derive_key_from_password(password: &str, salt: &str) -> Result<AesKey, CryptoError> {
    let iterations = NonZeroU32::new(PBKDF2_ITERATIONS)
        .ok_or_else(|| CryptoError::KeyDerivation("iteration count must be non-zero".into()))?;

    let mut output = [0u8; KEY_LEN];
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        iterations,
        salt.as_bytes(),
        password.as_bytes(),
        &mut output,
    );

    let key = AesKey::from_secret(SecretBytes::new(output));
    output.zeroize();
    Ok(key)
}
