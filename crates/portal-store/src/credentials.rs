//! WebAuthn credential collection.
//!
//! Credentials are immutable once stored. The primary key is the base64
//! credential id; `username` carries a non-unique secondary index.

use chrono::{DateTime, Utc};
use portal_crypto_core::validation::is_valid_credential_id;
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::db::SecureStore;
use crate::error::StoreError;

/// Registration output to persist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCredential {
    /// Base64 credential id; must decode to 16..=512 bytes.
    pub id: String,
    /// Base64 public key as returned by the authenticator.
    pub public_key: String,
    /// COSE algorithm identifier (-7 for ES256).
    pub algorithm: i64,
    #[serde(default)]
    pub sign_count: u32,
    #[serde(default)]
    pub transports: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attestation_format: Option<String>,
}

/// A persisted credential row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredCredential {
    pub id: String,
    pub username: String,
    pub public_key: String,
    pub algorithm: i64,
    pub sign_count: u32,
    pub transports: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attestation_format: Option<String>,
    pub created_at: DateTime<Utc>,
}

const SELECT_COLUMNS: &str = "SELECT id, username, public_key, algorithm, sign_count, transports, \
     attestation_format, created_at FROM webauthn_credentials";

fn row_to_credential(row: &Row<'_>) -> rusqlite::Result<(StoredCredential, String)> {
    let transports: String = row.get(5)?;
    Ok((
        StoredCredential {
            id: row.get(0)?,
            username: row.get(1)?,
            public_key: row.get(2)?,
            algorithm: row.get(3)?,
            sign_count: row.get(4)?,
            transports: Vec::new(),
            attestation_format: row.get(6)?,
            created_at: row.get(7)?,
        },
        transports,
    ))
}

fn finish_row(
    (mut credential, transports): (StoredCredential, String),
) -> Result<StoredCredential, StoreError> {
    credential.transports = serde_json::from_str(&transports)?;
    Ok(credential)
}

impl SecureStore {
    /// Insert a credential for `username`.
    ///
    /// # Errors
    ///
    /// - [`StoreError::InvalidCredentialId`] if the id is not a valid credential id.
    /// - [`StoreError::ConstraintViolation`] if a credential with this id already exists.
    /// - [`StoreError::Database`] for other storage failures.
    pub async fn store_credential(
        &self,
        credential: NewCredential,
        username: &str,
    ) -> Result<StoredCredential, StoreError> {
        if !is_valid_credential_id(&credential.id) {
            return Err(StoreError::InvalidCredentialId);
        }

        let stored = StoredCredential {
            id: credential.id,
            username: username.to_owned(),
            public_key: credential.public_key,
            algorithm: credential.algorithm,
            sign_count: credential.sign_count,
            transports: credential.transports,
            attestation_format: credential.attestation_format,
            created_at: Utc::now(),
        };
        let transports = serde_json::to_string(&stored.transports)?;

        self.write(|tx| {
            tx.execute(
                "INSERT INTO webauthn_credentials \
                 (id, username, public_key, algorithm, sign_count, transports, attestation_format, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    stored.id,
                    stored.username,
                    stored.public_key,
                    stored.algorithm,
                    stored.sign_count,
                    transports,
                    stored.attestation_format,
                    stored.created_at,
                ],
            )?;
            Ok(())
        })
        .await?;

        info!(user = %stored.username, "credential stored");
        Ok(stored)
    }

    /// All stored credentials, in no particular order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    pub async fn get_stored_credentials(&self) -> Result<Vec<StoredCredential>, StoreError> {
        self.read(|tx| {
            let mut stmt = tx.prepare(SELECT_COLUMNS)?;
            let rows = stmt
                .query_map([], row_to_credential)?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter().map(finish_row).collect()
        })
        .await
    }

    /// Look up one credential by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    pub async fn get_credential(&self, id: &str) -> Result<Option<StoredCredential>, StoreError> {
        self.read(|tx| {
            let row = tx
                .query_row(
                    &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                    params![id],
                    row_to_credential,
                )
                .optional()?;
            row.map(finish_row).transpose()
        })
        .await
    }

    /// Credentials registered by `username`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    pub async fn get_credentials_by_username(
        &self,
        username: &str,
    ) -> Result<Vec<StoredCredential>, StoreError> {
        self.read(|tx| {
            let mut stmt = tx.prepare(&format!(
                "{SELECT_COLUMNS} WHERE username = ?1 ORDER BY created_at ASC"
            ))?;
            let rows = stmt
                .query_map(params![username], row_to_credential)?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter().map(finish_row).collect()
        })
        .await
    }
}
