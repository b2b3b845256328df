//! Base64 codecs and WebAuthn payload transcoding.
//!
//! Two alphabets are used across the portal:
//! - standard, padded base64 for stored binary values (credential ids,
//!   signatures, ciphertext, digests)
//! - URL-safe base64 without padding for the session token segments

use data_encoding::{BASE64, BASE64URL_NOPAD};

use crate::error::CryptoError;

/// Encode bytes as standard, padded base64.
#[must_use]
pub fn encode_base64(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

/// Decode standard, padded base64.
///
/// # Errors
///
/// Returns `CryptoError::Encoding` if the input is not canonical base64.
pub fn decode_base64(input: &str) -> Result<Vec<u8>, CryptoError> {
    BASE64
        .decode(input.as_bytes())
        .map_err(|e| CryptoError::Encoding(format!("invalid base64: {e}")))
}

/// Encode bytes as URL-safe base64 without padding.
#[must_use]
pub fn encode_base64url(bytes: &[u8]) -> String {
    BASE64URL_NOPAD.encode(bytes)
}

/// Decode URL-safe base64 without padding.
///
/// Trailing `=` padding is tolerated and stripped before decoding.
///
/// # Errors
///
/// Returns `CryptoError::Encoding` if the input is not valid base64url.
pub fn decode_base64url(input: &str) -> Result<Vec<u8>, CryptoError> {
    BASE64URL_NOPAD
        .decode(input.trim_end_matches('=').as_bytes())
        .map_err(|e| CryptoError::Encoding(format!("invalid base64url: {e}")))
}

// ---------------------------------------------------------------------------
// WebAuthn data
// ---------------------------------------------------------------------------

/// A value headed into a WebAuthn ceremony: either text or raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebAuthnData {
    /// Text, transcoded to UTF-8.
    Text(String),
    /// Raw bytes, passed through unchanged.
    Binary(Vec<u8>),
}

impl From<&str> for WebAuthnData {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<String> for WebAuthnData {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Vec<u8>> for WebAuthnData {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Binary(bytes)
    }
}

/// Produce the byte form of WebAuthn input: UTF-8 for text, identity for bytes.
#[must_use]
pub fn encode_webauthn_data(data: WebAuthnData) -> Vec<u8> {
    match data {
        WebAuthnData::Text(text) => text.into_bytes(),
        WebAuthnData::Binary(bytes) => bytes,
    }
}

/// Decode WebAuthn bytes as UTF-8 text.
///
/// Invalid sequences are replaced with U+FFFD rather than rejected.
#[must_use]
pub fn decode_webauthn_data(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base64_empty_roundtrip() {
        assert_eq!(encode_base64(&[]), "");
        assert_eq!(decode_base64("").expect("decode"), Vec::<u8>::new());
    }

    #[test]
    fn base64_known_vector() {
        assert_eq!(encode_base64(b"portal"), "cG9ydGFs");
        assert_eq!(encode_base64(&[0xFB, 0xFF]), "+/8=");
    }

    #[test]
    fn base64url_has_no_padding_and_url_alphabet() {
        let encoded = encode_base64url(&[0xFB, 0xFF]);
        assert_eq!(encoded, "-_8");
        assert_eq!(decode_base64url(&encoded).expect("decode"), vec![0xFB, 0xFF]);
    }

    #[test]
    fn base64url_tolerates_trailing_padding() {
        assert_eq!(decode_base64url("-_8=").expect("decode"), vec![0xFB, 0xFF]);
    }

    #[test]
    fn decode_base64_rejects_garbage() {
        let err = decode_base64("not base64!!").expect_err("should fail");
        assert!(matches!(err, CryptoError::Encoding(_)));
    }

    #[test]
    fn webauthn_text_becomes_utf8() {
        let bytes = encode_webauthn_data("olá".into());
        assert_eq!(bytes, "olá".as_bytes());
        assert_eq!(decode_webauthn_data(&bytes), "olá");
    }

    #[test]
    fn webauthn_binary_passes_through() {
        let raw = vec![0x00, 0xFF, 0x10];
        assert_eq!(encode_webauthn_data(raw.clone().into()), raw);
    }

    #[test]
    fn webauthn_decode_is_lossy() {
        assert_eq!(decode_webauthn_data(&[0x61, 0xFF]), "a\u{FFFD}");
    }
}
