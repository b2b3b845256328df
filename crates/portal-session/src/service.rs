//! Store-backed token operations: revocation-aware validation, revocation,
//! and mint-and-persist.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat};
use portal_crypto_core::sha256_base64;
use portal_store::{events, SecureStore};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::error::SessionError;
use crate::jwt::{decode_jwt, expiry_of, Claims, TokenSigner};

/// Placeholder used when a token carries no `userId` or `jti`.
pub const UNKNOWN: &str = "unknown";

/// Revocation-list key for `token`. The raw token is never stored there.
#[must_use]
pub fn token_hash(token: &str) -> String {
    sha256_base64(token)
}

fn claim_str<'a>(claims: &'a Claims, name: &str) -> &'a str {
    claims.get(name).and_then(Value::as_str).unwrap_or(UNKNOWN)
}

/// `userId` claim, or `"unknown"`.
#[must_use]
pub fn user_of(claims: &Claims) -> &str {
    claim_str(claims, "userId")
}

/// Couples a [`TokenSigner`] with the store that persists and revokes tokens.
#[derive(Debug)]
pub struct TokenService {
    signer: TokenSigner,
    store: Arc<SecureStore>,
}

impl TokenService {
    #[must_use]
    pub const fn new(signer: TokenSigner, store: Arc<SecureStore>) -> Self {
        Self { signer, store }
    }

    #[must_use]
    pub const fn signer(&self) -> &TokenSigner {
        &self.signer
    }

    #[must_use]
    pub const fn store(&self) -> &Arc<SecureStore> {
        &self.store
    }

    /// Verify `token` and make sure it has not been revoked.
    ///
    /// Fail-closed: a revocation lookup that errors counts as revoked.
    pub async fn validate_jwt(&self, token: &str) -> Option<Claims> {
        let claims = self.signer.validate_jwt(token)?;
        match self.store.is_token_revoked(&token_hash(token)).await {
            Ok(false) => Some(claims),
            Ok(true) => None,
            Err(e) => {
                warn!(error = %e, "revocation lookup failed; rejecting token");
                None
            }
        }
    }

    /// Mint a token for `claims` and persist it with the same lifetime.
    ///
    /// # Errors
    ///
    /// - [`SessionError::InvalidTtl`] if `ttl_secs` is zero or overflows.
    /// - [`SessionError::Store`] if the token cannot be persisted.
    pub async fn issue_token(&self, claims: &Claims, ttl_secs: u64) -> Result<String, SessionError> {
        let token = self.signer.generate_jwt(claims, ttl_secs)?;
        self.store.store_token(&token, ttl_secs).await?;
        Ok(token)
    }

    /// Mint a token for `claims`, persisting it together with a
    /// `SESSION_STARTED` audit row.
    ///
    /// # Errors
    ///
    /// - [`SessionError::InvalidTtl`] if `ttl_secs` is zero or overflows.
    /// - [`SessionError::Store`] if the token or the audit row cannot be
    ///   written; neither is then stored.
    pub async fn start_session(&self, claims: &Claims, ttl_secs: u64) -> Result<String, SessionError> {
        let token = self.signer.generate_jwt(claims, ttl_secs)?;
        self.store
            .store_token_with_event(
                &token,
                ttl_secs,
                events::SESSION_STARTED,
                user_of(claims),
                &json!({ "ttlSecs": ttl_secs }),
            )
            .await?;
        Ok(token)
    }

    /// Verify `old_token` (revocation included), mint its replacement, and
    /// persist it together with a `TOKEN_REFRESHED` audit row.
    ///
    /// # Errors
    ///
    /// - [`SessionError::InvalidToken`] if `old_token` does not validate.
    /// - [`SessionError::Store`] if the new token or its audit row cannot be
    ///   written; neither is then stored.
    pub async fn refresh_jwt(&self, old_token: &str, ttl_secs: u64) -> Result<String, SessionError> {
        let claims = self
            .validate_jwt(old_token)
            .await
            .ok_or(SessionError::InvalidToken)?;
        let user = user_of(&claims).to_owned();

        let token = self.signer.reissue(claims, ttl_secs)?;
        self.store
            .store_token_with_event(
                &token,
                ttl_secs,
                events::TOKEN_REFRESHED,
                &user,
                &json!({ "ttlSecs": ttl_secs }),
            )
            .await?;

        info!(user = %user, ttl_secs, "session token refreshed");
        Ok(token)
    }

    /// Revoke `token`: record a `JWT_REVOKED` audit row and add the token's
    /// hash to the revocation list so later validation rejects it.
    ///
    /// The token is decoded without verification. Returns `false` if it cannot
    /// be decoded or either write fails.
    pub async fn revoke_jwt(&self, token: &str) -> bool {
        let Some(claims) = decode_jwt(token) else {
            return false;
        };
        let user = user_of(&claims);
        let expiry = expiry_of(&claims);
        let expires_at = expiry
            .and_then(|exp| DateTime::from_timestamp(exp, 0))
            .map(|ts| ts.to_rfc3339_opts(SecondsFormat::Millis, true));
        let details = json!({
            "tokenId": claim_str(&claims, "jti"),
            "expiresAt": expires_at,
        });

        if let Err(e) = self
            .store
            .log_event(events::JWT_REVOKED, user, &details)
            .await
        {
            warn!(error = %e, "failed to record token revocation");
            return false;
        }

        // Without an expiry the entry must never be swept.
        let expires_at_ms = expiry
            .and_then(|exp| exp.checked_mul(1000))
            .unwrap_or(i64::MAX);
        if let Err(e) = self
            .store
            .revoke_token_hash(&token_hash(token), expires_at_ms)
            .await
        {
            warn!(error = %e, "failed to add token to revocation list");
            return false;
        }

        info!(user = %user, "session token revoked");
        true
    }

    /// Validated claims of the stored valid token, if there is one.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Store`] if the token read fails.
    pub async fn current_claims(&self) -> Result<Option<Claims>, SessionError> {
        match self.store.get_valid_token().await? {
            Some(token) => Ok(self.validate_jwt(&token).await),
            None => Ok(None),
        }
    }

    /// Unverified claims of the stored valid token, for display.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Store`] if the token read fails.
    pub async fn current_display_claims(&self) -> Result<Option<Claims>, SessionError> {
        Ok(self
            .store
            .get_valid_token()
            .await?
            .as_deref()
            .and_then(decode_jwt))
    }
}
