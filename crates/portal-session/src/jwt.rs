//! HS256 session tokens.
//!
//! Wire format: `base64url(header).base64url(payload).base64url(signature)`,
//! no padding. The signature is HMAC-SHA256 over `header "." payload`.
//!
//! [`TokenSigner`] is stateless: it knows nothing about revocation. Use
//! [`TokenService`](crate::service::TokenService) for checks that consult the store.

use std::fmt;

use chrono::Utc;
use portal_crypto_core::{
    constant_time_str_eq, decode_base64url, encode_base64url, generate_id, SecretBuffer,
};
use ring::hmac;
use serde_json::{Map, Value};

use crate::error::SessionError;
use crate::secret::SecretProvider;

/// Decoded token payload.
pub type Claims = Map<String, Value>;

pub const ISSUER: &str = "portal-seguro";
pub const AUDIENCE: &str = "webauthn-client";
pub const ALGORITHM: &str = "HS256";

/// Default token lifetime.
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 3600;

/// Default remaining-lifetime window that counts as "expiring soon".
pub const DEFAULT_REFRESH_THRESHOLD_SECS: u64 = 300;

const HEADER_JSON: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

/// Claims rewritten on every mint.
const TIME_CLAIMS: [&str; 3] = ["iat", "exp", "jti"];

/// Current Unix time in seconds.
pub(crate) fn now_secs() -> i64 {
    Utc::now().timestamp()
}

fn split_token(token: &str) -> Option<(&str, &str, &str)> {
    let mut parts = token.split('.');
    let header = parts.next()?;
    let payload = parts.next()?;
    let signature = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    Some((header, payload, signature))
}

fn decode_segment(segment: &str) -> Option<Claims> {
    let bytes = decode_base64url(segment).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Decode the payload without checking the signature.
///
/// For display only. Never base an authorization decision on the result.
#[must_use]
pub fn decode_jwt(token: &str) -> Option<Claims> {
    let (_, payload, _) = split_token(token)?;
    decode_segment(payload)
}

/// The `exp` claim, if present and integral.
#[must_use]
pub fn expiry_of(claims: &Claims) -> Option<i64> {
    claims.get("exp").and_then(Value::as_i64)
}

/// True if the token is unparseable, has no `exp`, or has at most
/// `threshold_secs` of lifetime left.
#[must_use]
pub fn is_token_expiring_soon(token: &str, threshold_secs: u64) -> bool {
    is_token_expiring_soon_at(token, threshold_secs, now_secs())
}

/// [`is_token_expiring_soon`] against an explicit clock.
#[must_use]
pub fn is_token_expiring_soon_at(token: &str, threshold_secs: u64, now: i64) -> bool {
    let Some(exp) = decode_jwt(token).as_ref().and_then(expiry_of) else {
        return true;
    };
    let threshold = i64::try_from(threshold_secs).unwrap_or(i64::MAX);
    exp.saturating_sub(now) <= threshold
}

/// Mints and verifies HS256 tokens with one secret.
pub struct TokenSigner {
    key: hmac::Key,
}

impl fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TokenSigner(***)")
    }
}

impl TokenSigner {
    /// Build a signer over `secret`.
    #[must_use]
    pub fn new(secret: &SecretBuffer) -> Self {
        Self {
            key: hmac::Key::new(hmac::HMAC_SHA256, secret.expose()),
        }
    }

    /// Build a signer from whatever secret `provider` supplies.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Secret`] if the provider has no usable secret.
    pub fn from_provider(provider: &dyn SecretProvider) -> Result<Self, SessionError> {
        Ok(Self::new(&provider.signing_secret()?))
    }

    fn sign_segments(&self, header: &str, payload: &str) -> String {
        let tag = hmac::sign(&self.key, format!("{header}.{payload}").as_bytes());
        encode_base64url(tag.as_ref())
    }

    /// Mint a token carrying `claims` plus `iat`, `exp`, `iss`, `aud`, and a
    /// random `jti` unless the caller supplied one.
    ///
    /// # Errors
    ///
    /// - [`SessionError::InvalidTtl`] if `ttl_secs` is zero or overflows.
    /// - [`SessionError::Serialization`] if the payload cannot be encoded.
    pub fn generate_jwt(&self, claims: &Claims, ttl_secs: u64) -> Result<String, SessionError> {
        self.generate_jwt_at(claims, ttl_secs, now_secs())
    }

    /// [`generate_jwt`](Self::generate_jwt) against an explicit clock.
    ///
    /// # Errors
    ///
    /// Same as [`generate_jwt`](Self::generate_jwt).
    pub fn generate_jwt_at(
        &self,
        claims: &Claims,
        ttl_secs: u64,
        now: i64,
    ) -> Result<String, SessionError> {
        if ttl_secs == 0 {
            return Err(SessionError::InvalidTtl(ttl_secs));
        }
        let exp = i64::try_from(ttl_secs)
            .ok()
            .and_then(|ttl| now.checked_add(ttl))
            .ok_or(SessionError::InvalidTtl(ttl_secs))?;

        let mut payload = claims.clone();
        if !payload.contains_key("jti") {
            payload.insert("jti".into(), Value::from(generate_id()));
        }
        payload.insert("iat".into(), Value::from(now));
        payload.insert("exp".into(), Value::from(exp));
        payload.insert("iss".into(), Value::from(ISSUER));
        payload.insert("aud".into(), Value::from(AUDIENCE));

        let header = encode_base64url(HEADER_JSON.as_bytes());
        let body = encode_base64url(&serde_json::to_vec(&payload)?);
        let signature = self.sign_segments(&header, &body);
        Ok(format!("{header}.{body}.{signature}"))
    }

    /// Verify `token` and return its claims.
    ///
    /// Fail-closed: `None` for a wrong segment count, a signature mismatch,
    /// an unexpected header, a missing or past `exp`, a wrong `iss` or `aud`,
    /// or any decoding failure.
    #[must_use]
    pub fn validate_jwt(&self, token: &str) -> Option<Claims> {
        self.validate_jwt_at(token, now_secs())
    }

    /// [`validate_jwt`](Self::validate_jwt) against an explicit clock.
    #[must_use]
    pub fn validate_jwt_at(&self, token: &str, now: i64) -> Option<Claims> {
        let (header, payload, signature) = split_token(token)?;

        let expected = self.sign_segments(header, payload);
        if !constant_time_str_eq(signature, &expected) {
            return None;
        }

        let header = decode_segment(header)?;
        if header.get("alg").and_then(Value::as_str) != Some(ALGORITHM) {
            return None;
        }

        let claims = decode_segment(payload)?;
        if expiry_of(&claims)? <= now {
            return None;
        }
        if claims.get("iss").and_then(Value::as_str) != Some(ISSUER) {
            return None;
        }
        if claims.get("aud").and_then(Value::as_str) != Some(AUDIENCE) {
            return None;
        }
        Some(claims)
    }

    /// Mint a replacement for already-verified `claims`: the time claims and
    /// `jti` are dropped and regenerated, everything else is carried over.
    ///
    /// # Errors
    ///
    /// Same as [`generate_jwt`](Self::generate_jwt).
    pub fn reissue(&self, mut claims: Claims, ttl_secs: u64) -> Result<String, SessionError> {
        for claim in TIME_CLAIMS {
            claims.remove(claim);
        }
        self.generate_jwt(&claims, ttl_secs)
    }

    /// Verify `old_token` and mint a replacement with a fresh lifetime.
    ///
    /// # Errors
    ///
    /// - [`SessionError::InvalidToken`] if `old_token` does not validate.
    /// - Otherwise as [`generate_jwt`](Self::generate_jwt).
    pub fn refresh_jwt(&self, old_token: &str, ttl_secs: u64) -> Result<String, SessionError> {
        let claims = self
            .validate_jwt(old_token)
            .ok_or(SessionError::InvalidToken)?;
        self.reissue(claims, ttl_secs)
    }
}
