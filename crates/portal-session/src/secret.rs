//! Token signing secret sources.
//!
//! The HMAC secret is supplied at runtime and never compiled in.

use std::fmt;

use portal_crypto_core::SecretBuffer;

use crate::error::SessionError;

/// Environment variable read by [`EnvSecretProvider::new`].
pub const SECRET_ENV_VAR: &str = "PORTAL_JWT_SECRET";

/// Shortest accepted secret, in bytes (the HMAC-SHA256 output size).
pub const MIN_SECRET_LEN: usize = 32;

/// Supplies the HMAC secret used to sign session tokens.
pub trait SecretProvider: Send + Sync {
    /// Return the signing secret.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Secret`] if no usable secret is available.
    fn signing_secret(&self) -> Result<SecretBuffer, SessionError>;
}

fn check_len(secret: &[u8]) -> Result<(), SessionError> {
    if secret.len() < MIN_SECRET_LEN {
        return Err(SessionError::Secret(format!(
            "secret must be at least {MIN_SECRET_LEN} bytes, got {}",
            secret.len()
        )));
    }
    Ok(())
}

/// Reads the secret from an environment variable on every call.
#[derive(Debug, Clone)]
pub struct EnvSecretProvider {
    var: String,
}

impl EnvSecretProvider {
    /// Read from [`SECRET_ENV_VAR`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_var(SECRET_ENV_VAR)
    }

    /// Read from a custom variable name.
    #[must_use]
    pub fn with_var(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvSecretProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SecretProvider for EnvSecretProvider {
    fn signing_secret(&self) -> Result<SecretBuffer, SessionError> {
        let value = std::env::var(&self.var)
            .map_err(|_| SessionError::Secret(format!("{} is not set", self.var)))?;
        check_len(value.as_bytes())?;
        Ok(SecretBuffer::new(value.as_bytes()))
    }
}

/// A fixed secret handed in by the embedding application.
#[derive(Clone)]
pub struct StaticSecretProvider {
    secret: SecretBuffer,
}

impl StaticSecretProvider {
    /// Wrap `secret`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Secret`] if `secret` is shorter than [`MIN_SECRET_LEN`].
    pub fn new(secret: &[u8]) -> Result<Self, SessionError> {
        check_len(secret)?;
        Ok(Self {
            secret: SecretBuffer::new(secret),
        })
    }

    /// A fresh random secret, for tests and single-process deployments.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Crypto`] if the CSPRNG fails.
    pub fn random() -> Result<Self, SessionError> {
        Ok(Self {
            secret: SecretBuffer::random(MIN_SECRET_LEN)?,
        })
    }
}

impl fmt::Debug for StaticSecretProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StaticSecretProvider(***)")
    }
}

impl SecretProvider for StaticSecretProvider {
    fn signing_secret(&self) -> Result<SecretBuffer, SessionError> {
        Ok(self.secret.clone())
    }
}
