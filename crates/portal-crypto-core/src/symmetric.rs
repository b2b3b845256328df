//! AES-256-GCM authenticated encryption of text fields.
//!
//! This module provides:
//! - [`AesKey`]: a 256-bit key whose bytes never leave this crate
//! - [`encrypt_data`]: encrypt UTF-8 text under a fresh random 96-bit IV
//! - [`decrypt_data`]: authenticate and decrypt an [`EncryptedPayload`]
//!
//! Wire format: `iv` is base64 of the 12-byte IV; `data` is base64 of
//! `ciphertext || tag`, the layout WebCrypto emits.

use rand::rngs::OsRng;
use rand::RngCore;
use ring::aead;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::encoding::{decode_base64, encode_base64};
use crate::error::CryptoError;
use crate::memory::SecretBytes;

/// AES-256-GCM IV length in bytes (96 bits).
pub const IV_LEN: usize = 12;

/// AES-256-GCM authentication tag length in bytes (128 bits).
pub const TAG_LEN: usize = 16;

/// AES-256-GCM key length in bytes (256 bits).
pub const KEY_LEN: usize = 32;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Non-exportable AES-256-GCM key.
///
/// Obtained from [`AesKey::generate`] or
/// [`crate::kdf::derive_key_from_password`]. The raw bytes are only
/// reachable inside this crate.
#[derive(Debug)]
pub struct AesKey {
    bytes: SecretBytes<KEY_LEN>,
}

impl AesKey {
    /// Generate a random key.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::Random` if the CSPRNG fails.
    pub fn generate() -> Result<Self, CryptoError> {
        Ok(Self {
            bytes: SecretBytes::random()?,
        })
    }

    pub(crate) const fn from_secret(bytes: SecretBytes<KEY_LEN>) -> Self {
        Self { bytes }
    }

    fn less_safe_key(&self) -> Result<aead::LessSafeKey, CryptoError> {
        let unbound = aead::UnboundKey::new(&aead::AES_256_GCM, self.bytes.expose())
            .map_err(|_| CryptoError::InvalidKeyMaterial("failed to create AES-256-GCM key".into()))?;
        Ok(aead::LessSafeKey::new(unbound))
    }
}

/// Authenticated ciphertext with its IV, both base64.
#[must_use = "encrypted data must be stored or transmitted"]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedPayload {
    /// Base64 of the 12-byte IV, unique per encryption.
    pub iv: String,
    /// Base64 of `ciphertext || tag`.
    pub data: String,
}

// ---------------------------------------------------------------------------
// Core encryption
// ---------------------------------------------------------------------------

/// Encrypt UTF-8 text with AES-256-GCM under a fresh random IV.
///
/// # Errors
///
/// Returns `CryptoError::Encryption` if the seal operation fails.
pub fn encrypt_data(plaintext: &str, key: &AesKey) -> Result<EncryptedPayload, CryptoError> {
    let sealing_key = key.less_safe_key()?;

    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);
    let nonce = aead::Nonce::assume_unique_for_key(iv);

    let mut in_out = plaintext.as_bytes().to_vec();
    if sealing_key
        .seal_in_place_append_tag(nonce, aead::Aad::empty(), &mut in_out)
        .is_err()
    {
        in_out.zeroize();
        return Err(CryptoError::Encryption(
            "AES-256-GCM encryption failed".into(),
        ));
    }

    Ok(EncryptedPayload {
        iv: encode_base64(&iv),
        data: encode_base64(&in_out),
    })
}

/// Decrypt an [`EncryptedPayload`] produced by [`encrypt_data`].
///
/// # Errors
///
/// - `CryptoError::Encoding` if `iv` or `data` is not base64, or the
///   plaintext is not UTF-8.
/// - `CryptoError::Decryption` if authentication fails: tampered data,
///   wrong key, or wrong IV (including an IV of the wrong length).
pub fn decrypt_data(payload: &EncryptedPayload, key: &AesKey) -> Result<String, CryptoError> {
    let opening_key = key.less_safe_key()?;

    let iv = decode_base64(&payload.iv)?;
    let nonce = aead::Nonce::try_assume_unique_for_key(&iv).map_err(|_| CryptoError::Decryption)?;

    let mut ct_tag = decode_base64(&payload.data)?;
    let plaintext = opening_key
        .open_in_place(nonce, aead::Aad::empty(), &mut ct_tag)
        .map_err(|_| CryptoError::Decryption)?;

    let result = std::str::from_utf8(plaintext)
        .map(str::to_owned)
        .map_err(|e| CryptoError::Encoding(format!("decrypted data is not UTF-8: {e}")));
    ct_tag.zeroize();
    result
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
