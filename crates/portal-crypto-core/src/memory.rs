//! Zeroizing holders for the signing secret, PKCS#8 documents and AES keys.
//!
//! Neither type prints its contents: `Debug` shows only the type name.

use std::fmt;

use rand::rngs::OsRng;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretSlice};
use zeroize::Zeroizing;

use crate::error::CryptoError;

fn fill_random(buf: &mut [u8]) -> Result<(), CryptoError> {
    OsRng
        .try_fill_bytes(buf)
        .map_err(|e| CryptoError::Random(format!("OS RNG failed: {e}")))
}

/// Secret of any length, erased on drop.
pub struct SecretBuffer(SecretSlice<u8>);

impl SecretBuffer {
    /// Copy `data` into a fresh secret allocation.
    #[must_use]
    pub fn new(data: &[u8]) -> Self {
        Self(data.to_vec().into())
    }

    /// `len` bytes from the OS RNG.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::Random` if the RNG fails.
    pub fn random(len: usize) -> Result<Self, CryptoError> {
        let mut bytes = Zeroizing::new(vec![0u8; len]);
        fill_random(&mut bytes)?;
        Ok(Self::new(&bytes))
    }

    #[must_use]
    pub fn expose(&self) -> &[u8] {
        self.0.expose_secret()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.expose().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.expose().is_empty()
    }
}

impl Clone for SecretBuffer {
    fn clone(&self) -> Self {
        Self::new(self.expose())
    }
}

impl fmt::Debug for SecretBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretBuffer(***)")
    }
}

/// `N`-byte key, erased on drop.
pub struct SecretBytes<const N: usize>(Zeroizing<[u8; N]>);

impl<const N: usize> SecretBytes<N> {
    #[must_use]
    pub fn new(data: [u8; N]) -> Self {
        Self(Zeroizing::new(data))
    }

    /// `N` bytes from the OS RNG.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::Random` if the RNG fails.
    pub fn random() -> Result<Self, CryptoError> {
        let mut key = Self::new([0u8; N]);
        fill_random(&mut key.0[..])?;
        Ok(key)
    }

    #[must_use]
    pub fn expose(&self) -> &[u8; N] {
        &self.0
    }
}

impl<const N: usize> fmt::Debug for SecretBytes<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretBytes<{N}>(***)")
    }
}
