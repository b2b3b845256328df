//! `portal-crypto-core`: Credential cryptography primitives for the secure portal.
//!
//! This crate is the audit target: zero network, zero async, zero storage.
//! Every function is pure apart from randomness.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::arithmetic_side_effects))]

pub mod error;
pub mod memory;

pub mod encoding;
pub mod random;

pub mod compare;
pub mod digest;

pub mod kdf;
pub mod symmetric;

pub mod signing;

pub mod validation;

pub use compare::{constant_time_eq, constant_time_str_eq};
pub use digest::{generate_browser_fingerprint, sha256_base64, ClientEnvironment};
pub use encoding::{
    decode_base64, decode_base64url, decode_webauthn_data, encode_base64, encode_base64url,
    encode_webauthn_data, WebAuthnData,
};
pub use error::CryptoError;
pub use kdf::{derive_key_from_password, PBKDF2_ITERATIONS};
pub use memory::{SecretBuffer, SecretBytes};
pub use random::{generate_challenge, generate_id, generate_nonce, DEFAULT_CHALLENGE_LEN};
pub use signing::{
    check_algorithm_support, generate_key_pair, sign_data, verify_signature, SignatureAlgorithm,
    SigningKeyPair, VerifyingKey,
};
pub use symmetric::{decrypt_data, encrypt_data, AesKey, EncryptedPayload};
pub use validation::{
    is_valid_credential_id, is_valid_url, sanitize_input, sanitize_value, DEFAULT_MAX_INPUT_LEN,
};
