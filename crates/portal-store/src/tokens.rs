//! Session token collection.
//!
//! Rows are append-only: a refresh inserts a new row rather than updating the
//! old one. Expired rows are swept inside every insert so the table cannot
//! grow without bound, and reads pick the newest live row deterministically.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::db::{millis_to_datetime, now_millis, SecureStore};
use crate::error::StoreError;

/// A persisted token row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRecord {
    pub id: i64,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

fn ttl_to_millis(ttl_secs: u64) -> Result<i64, StoreError> {
    if ttl_secs == 0 {
        return Err(StoreError::InvalidTtl(ttl_secs));
    }
    ttl_secs
        .checked_mul(1000)
        .and_then(|ms| i64::try_from(ms).ok())
        .ok_or(StoreError::InvalidTtl(ttl_secs))
}

/// Insert `token` expiring `ttl_secs` after `now_ms`, after sweeping expired rows.
pub(crate) fn insert_token(
    conn: &Connection,
    token: &str,
    ttl_secs: u64,
    now_ms: i64,
) -> Result<TokenRecord, StoreError> {
    let expires_ms = now_ms
        .checked_add(ttl_to_millis(ttl_secs)?)
        .ok_or(StoreError::InvalidTtl(ttl_secs))?;

    let swept = delete_expired_tokens(conn, now_ms)?;
    if swept > 0 {
        debug!(swept, "evicted expired token rows");
    }

    conn.execute(
        "INSERT INTO jwt_tokens (token, expires_at, created_at) VALUES (?1, ?2, ?3)",
        params![token, expires_ms, now_ms],
    )?;

    Ok(TokenRecord {
        id: conn.last_insert_rowid(),
        token: token.to_owned(),
        expires_at: millis_to_datetime(expires_ms),
        created_at: millis_to_datetime(now_ms),
    })
}

/// Newest row whose expiry is strictly after `now_ms`.
pub(crate) fn select_valid_token(conn: &Connection, now_ms: i64) -> Result<Option<String>, StoreError> {
    let token = conn
        .query_row(
            "SELECT token FROM jwt_tokens WHERE expires_at > ?1 \
             ORDER BY created_at DESC, id DESC LIMIT 1",
            params![now_ms],
            |row| row.get(0),
        )
        .optional()?;
    Ok(token)
}

pub(crate) fn delete_expired_tokens(conn: &Connection, now_ms: i64) -> Result<usize, StoreError> {
    Ok(conn.execute(
        "DELETE FROM jwt_tokens WHERE expires_at <= ?1",
        params![now_ms],
    )?)
}

fn select_all_tokens(conn: &Connection) -> Result<Vec<TokenRecord>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, token, expires_at, created_at FROM jwt_tokens ORDER BY id ASC",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(TokenRecord {
                id: row.get(0)?,
                token: row.get(1)?,
                expires_at: millis_to_datetime(row.get(2)?),
                created_at: millis_to_datetime(row.get(3)?),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

impl SecureStore {
    /// Persist `token` with `expires = now + ttl_secs`.
    ///
    /// Earlier rows are kept unless already expired; expired rows are
    /// deleted in the same transaction.
    ///
    /// # Errors
    ///
    /// - [`StoreError::InvalidTtl`] if `ttl_secs` is zero or overflows.
    /// - [`StoreError::ConstraintViolation`] if the exact token string is already stored.
    /// - [`StoreError::Database`] for other storage failures.
    pub async fn store_token(&self, token: &str, ttl_secs: u64) -> Result<TokenRecord, StoreError> {
        let now = now_millis();
        self.write(|tx| insert_token(tx, token, ttl_secs, now)).await
    }

    /// The most recently created token that has not expired, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    pub async fn get_valid_token(&self) -> Result<Option<String>, StoreError> {
        let now = now_millis();
        self.read(|tx| select_valid_token(tx, now)).await
    }

    /// Every token row, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    pub async fn get_tokens(&self) -> Result<Vec<TokenRecord>, StoreError> {
        self.read(|tx| select_all_tokens(tx)).await
    }

    /// Delete expired token rows and return how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the delete fails.
    pub async fn purge_expired_tokens(&self) -> Result<usize, StoreError> {
        let now = now_millis();
        self.write(|tx| delete_expired_tokens(tx, now)).await
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
