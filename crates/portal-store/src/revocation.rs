//! Revoked-token list.
//!
//! Keyed by a digest of the token, never the token itself. A row only needs
//! to outlive the token it blocks, so rows past their `expires_at` are swept
//! on every insert.

use rusqlite::{params, Connection};
use tracing::debug;

use crate::db::{now_millis, SecureStore};
use crate::error::StoreError;

pub(crate) fn insert_revocation(
    conn: &Connection,
    token_hash: &str,
    expires_at_ms: i64,
    now_ms: i64,
) -> Result<(), StoreError> {
    let swept = conn.execute(
        "DELETE FROM revoked_tokens WHERE expires_at <= ?1",
        params![now_ms],
    )?;
    if swept > 0 {
        debug!(swept, "evicted expired revocation rows");
    }
    conn.execute(
        "INSERT OR REPLACE INTO revoked_tokens (token_hash, revoked_at, expires_at) \
         VALUES (?1, ?2, ?3)",
        params![token_hash, now_ms, expires_at_ms],
    )?;
    Ok(())
}

pub(crate) fn revocation_exists(conn: &Connection, token_hash: &str) -> Result<bool, StoreError> {
    let found: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM revoked_tokens WHERE token_hash = ?1)",
        params![token_hash],
        |row| row.get(0),
    )?;
    Ok(found)
}

impl SecureStore {
    /// Record that the token hashing to `token_hash` is revoked until
    /// `expires_at_ms` (Unix milliseconds). Revoking twice is harmless.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the write fails.
    pub async fn revoke_token_hash(
        &self,
        token_hash: &str,
        expires_at_ms: i64,
    ) -> Result<(), StoreError> {
        let now = now_millis();
        self.write(|tx| insert_revocation(tx, token_hash, expires_at_ms, now))
            .await
    }

    /// Whether `token_hash` is on the revocation list.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    pub async fn is_token_revoked(&self, token_hash: &str) -> Result<bool, StoreError> {
        self.read(|tx| revocation_exists(tx, token_hash)).await
    }
}
