//! ECDSA signing for credential assertions.
//!
//! This module provides:
//! - [`generate_key_pair`]: generate an ECDSA P-256 key pair
//! - [`sign_data`]: sign bytes with ECDSA-SHA256, base64 signature
//! - [`verify_signature`]: verify a base64 signature against a public key
//! - [`check_algorithm_support`]: probe which signature algorithms can generate keys here
//!
//! # Signature format
//!
//! Signatures use the fixed-length IEEE P1363 encoding (`r || s`, 64 bytes
//! for P-256), the same form WebCrypto produces, rather than ASN.1 DER.

use rand::rngs::OsRng;
use ring::rand::SystemRandom;
use ring::signature::{
    self, EcdsaKeyPair, EcdsaSigningAlgorithm, KeyPair, RsaKeyPair, UnparsedPublicKey,
};
use rsa::pkcs8::EncodePrivateKey;
use rsa::RsaPrivateKey;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::encoding::{decode_base64, encode_base64};
use crate::error::CryptoError;
use crate::memory::SecretBuffer;

/// Uncompressed SEC1 public key length for P-256 (`0x04 || x || y`).
pub const P256_PUBLIC_KEY_LEN: usize = 65;

/// Fixed-length P-256 signature length (`r || s`).
pub const P256_SIGNATURE_LEN: usize = 64;

// ---------------------------------------------------------------------------
// Algorithm capability discovery
// ---------------------------------------------------------------------------

/// Signature algorithms a WebAuthn relying party may negotiate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignatureAlgorithm {
    /// RSASSA-PKCS1-v1_5 with SHA-256 (COSE -257).
    RsaPkcs1Sha256,
    /// ECDSA on P-256 with SHA-256 (COSE -7).
    EcdsaP256Sha256,
    /// ECDSA on P-384 with SHA-384 (COSE -35).
    EcdsaP384Sha384,
}

impl SignatureAlgorithm {
    /// Every algorithm probed by [`check_algorithm_support`], in preference order.
    pub const ALL: [Self; 3] = [
        Self::RsaPkcs1Sha256,
        Self::EcdsaP256Sha256,
        Self::EcdsaP384Sha384,
    ];

    /// COSE algorithm identifier.
    #[must_use]
    pub const fn cose_id(self) -> i64 {
        match self {
            Self::RsaPkcs1Sha256 => -257,
            Self::EcdsaP256Sha256 => -7,
            Self::EcdsaP384Sha384 => -35,
        }
    }

    /// Attempt to generate a throwaway key for this algorithm.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::KeyGeneration` when generation fails, or
    /// `CryptoError::Signature` when the generated RSA key cannot sign.
    pub fn probe(self) -> Result<(), CryptoError> {
        let alg = match self {
            Self::RsaPkcs1Sha256 => return try_rsa_pkcs1(),
            Self::EcdsaP256Sha256 => &signature::ECDSA_P256_SHA256_FIXED_SIGNING,
            Self::EcdsaP384Sha384 => &signature::ECDSA_P384_SHA384_FIXED_SIGNING,
        };
        let rng = SystemRandom::new();
        EcdsaKeyPair::generate_pkcs8(alg, &rng)
            .map(drop)
            .map_err(|_| CryptoError::KeyGeneration(format!("{self:?} key generation failed")))
    }
}

/// Modulus size WebAuthn authenticators use for RS256.
const RSA_CHECK_BITS: usize = 2048;

/// `ring` cannot generate RSA keys, so the key comes from `rsa` and is then
/// loaded into `ring` for a sign/verify round trip.
fn try_rsa_pkcs1() -> Result<(), CryptoError> {
    let key = RsaPrivateKey::new(&mut OsRng, RSA_CHECK_BITS)
        .map_err(|e| CryptoError::KeyGeneration(format!("RSA key generation failed: {e}")))?;
    let der = key
        .to_pkcs8_der()
        .map_err(|e| CryptoError::KeyGeneration(format!("RSA PKCS#8 encoding failed: {e}")))?;
    let key_pair = RsaKeyPair::from_pkcs8(der.as_bytes())
        .map_err(|e| CryptoError::KeyGeneration(format!("RSA key rejected: {e}")))?;

    let rng = SystemRandom::new();
    let mut sig = vec![0u8; key_pair.public().modulus_len()];
    key_pair
        .sign(&signature::RSA_PKCS1_SHA256, &rng, SUPPORT_CHECK_MESSAGE, &mut sig)
        .map_err(|_| CryptoError::Signature("RSA test signing failed".into()))?;
    UnparsedPublicKey::new(
        &signature::RSA_PKCS1_2048_8192_SHA256,
        key_pair.public().as_ref(),
    )
    .verify(SUPPORT_CHECK_MESSAGE, &sig)
    .map_err(|_| CryptoError::Signature("RSA test verification failed".into()))
}

const SUPPORT_CHECK_MESSAGE: &[u8] = b"portal algorithm check";

/// Return the algorithms for which key generation succeeds.
///
/// Probe failures are capability information, not errors: they are logged
/// at debug level and the algorithm is left out of the result.
#[must_use]
pub fn check_algorithm_support() -> Vec<SignatureAlgorithm> {
    SignatureAlgorithm::ALL
        .into_iter()
        .filter(|alg| match alg.probe() {
            Ok(()) => true,
            Err(e) => {
                debug!(algorithm = ?alg, error = %e, "signature algorithm unavailable");
                false
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Key types
// ---------------------------------------------------------------------------

/// ECDSA P-256 public key (uncompressed SEC1 point). Safe to share.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyingKey {
    bytes: Vec<u8>,
}

impl VerifyingKey {
    /// Wrap an uncompressed SEC1 P-256 point.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidKeyMaterial` if the point is not 65 bytes
    /// starting with `0x04`.
    pub fn from_sec1(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != P256_PUBLIC_KEY_LEN || bytes.first() != Some(&0x04) {
            return Err(CryptoError::InvalidKeyMaterial(format!(
                "expected {P256_PUBLIC_KEY_LEN}-byte uncompressed P-256 point, got {} bytes",
                bytes.len()
            )));
        }
        Ok(Self {
            bytes: bytes.to_vec(),
        })
    }

    /// Raw SEC1 bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Base64 of the SEC1 bytes, the form persisted with a credential.
    #[must_use]
    pub fn to_base64(&self) -> String {
        encode_base64(&self.bytes)
    }
}

/// ECDSA P-256 signing key pair.
///
/// The PKCS#8 document is held in a [`SecretBuffer`]; this type does not
/// implement `Serialize`, so private key material cannot leak through serde.
pub struct SigningKeyPair {
    pkcs8: SecretBuffer,
    key_pair: EcdsaKeyPair,
    public: VerifyingKey,
}

impl SigningKeyPair {
    /// Parse a PKCS#8 v1 document produced by [`generate_key_pair`].
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::KeyGeneration` if the document is rejected.
    pub fn from_pkcs8(pkcs8: &[u8]) -> Result<Self, CryptoError> {
        let rng = SystemRandom::new();
        let key_pair = EcdsaKeyPair::from_pkcs8(signing_alg(), pkcs8, &rng)
            .map_err(|e| CryptoError::KeyGeneration(format!("PKCS#8 rejected: {e}")))?;
        let public = VerifyingKey::from_sec1(key_pair.public_key().as_ref())?;
        Ok(Self {
            pkcs8: SecretBuffer::new(pkcs8),
            key_pair,
            public,
        })
    }

    /// The public half of the pair.
    #[must_use]
    pub const fn public_key(&self) -> &VerifyingKey {
        &self.public
    }

    /// The PKCS#8 document, for sealing into storage with [`crate::symmetric`].
    #[must_use]
    pub const fn pkcs8(&self) -> &SecretBuffer {
        &self.pkcs8
    }
}

impl std::fmt::Debug for SigningKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SigningKeyPair(***)")
    }
}

const fn signing_alg() -> &'static EcdsaSigningAlgorithm {
    &signature::ECDSA_P256_SHA256_FIXED_SIGNING
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Generate a new ECDSA P-256 key pair.
///
/// # Errors
///
/// Returns `CryptoError::KeyGeneration` if the CSPRNG or key parsing fails.
pub fn generate_key_pair() -> Result<SigningKeyPair, CryptoError> {
    let rng = SystemRandom::new();
    let document = EcdsaKeyPair::generate_pkcs8(signing_alg(), &rng)
        .map_err(|_| CryptoError::KeyGeneration("P-256 key generation failed".into()))?;
    SigningKeyPair::from_pkcs8(document.as_ref())
}

/// Sign `data` with ECDSA-SHA256 and return the base64 signature.
///
/// # Errors
///
/// Returns `CryptoError::Signature` if the signing operation fails.
pub fn sign_data(key_pair: &SigningKeyPair, data: &[u8]) -> Result<String, CryptoError> {
    let rng = SystemRandom::new();
    let sig = key_pair
        .key_pair
        .sign(&rng, data)
        .map_err(|_| CryptoError::Signature("ECDSA P-256 signing failed".into()))?;
    Ok(encode_base64(sig.as_ref()))
}

/// Verify a base64 ECDSA-SHA256 signature over `data`.
///
/// Returns `Ok(false)` for a well-formed signature that does not match.
///
/// # Errors
///
/// Returns `CryptoError::Encoding` if `signature_b64` is not base64.
pub fn verify_signature(
    public_key: &VerifyingKey,
    signature_b64: &str,
    data: &[u8],
) -> Result<bool, CryptoError> {
    let sig = decode_base64(signature_b64)?;
    let key = UnparsedPublicKey::new(&signature::ECDSA_P256_SHA256_FIXED, public_key.as_bytes());
    Ok(key.verify(data, &sig).is_ok())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
