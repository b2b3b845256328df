//! Append-only session audit log.
//!
//! Rows are keyed by an RFC 3339 nanosecond timestamp. The store keeps those
//! timestamps strictly increasing per handle, so back-to-back events never
//! collide on the primary key and lexical order matches chronological order.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, Row, TransactionBehavior};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::db::{now_millis, SecureStore};
use crate::error::StoreError;
use crate::ip_lookup::UNKNOWN_IP;
use crate::tokens::{insert_token, TokenRecord};

/// Event types written by the portal.
pub mod events {
    pub const SESSION_STARTED: &str = "SESSION_STARTED";
    pub const SESSION_ENDED: &str = "SESSION_ENDED";
    pub const TOKEN_REFRESHED: &str = "TOKEN_REFRESHED";
    pub const JWT_REVOKED: &str = "JWT_REVOKED";
    pub const CREDENTIAL_REGISTERED: &str = "CREDENTIAL_REGISTERED";
}

/// Default page size for [`SecureStore::get_session_logs`] callers.
pub const DEFAULT_LOG_LIMIT: usize = 50;

/// One audit row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionLogEntry {
    pub timestamp: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub user: String,
    /// JSON-serialized event details.
    pub details: String,
    pub user_agent: String,
    #[serde(rename = "clientIP")]
    pub client_ip: String,
}

impl SessionLogEntry {
    /// Parse [`details`](Self::details) back into JSON.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialization`] if the stored text is not JSON.
    pub fn details_json(&self) -> Result<serde_json::Value, StoreError> {
        Ok(serde_json::from_str(&self.details)?)
    }

    /// The row timestamp as a `DateTime`, if it parses.
    #[must_use]
    pub fn timestamp_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .ok()
            .map(|ts| ts.with_timezone(&Utc))
    }
}

/// Next strictly increasing nanosecond timestamp.
///
/// Uses wall-clock time unless it has not advanced past `last`, in which case
/// `last + 1` is used.
pub(crate) fn next_timestamp_nanos(now_nanos: i64, last: i64) -> i64 {
    match last.checked_add(1) {
        Some(bumped) => now_nanos.max(bumped),
        None => now_nanos,
    }
}

fn now_nanos() -> i64 {
    Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX)
}

pub(crate) fn format_timestamp(nanos: i64) -> String {
    DateTime::from_timestamp_nanos(nanos).to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn clamp_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<SessionLogEntry> {
    Ok(SessionLogEntry {
        timestamp: row.get(0)?,
        event_type: row.get(1)?,
        user: row.get(2)?,
        details: row.get(3)?,
        user_agent: row.get(4)?,
        client_ip: row.get(5)?,
    })
}

const SELECT_COLUMNS: &str =
    "SELECT timestamp, event_type, user, details, user_agent, client_ip FROM session_logs";

pub(crate) fn insert_entry(conn: &Connection, entry: &SessionLogEntry) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO session_logs (timestamp, event_type, user, details, user_agent, client_ip) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            entry.timestamp,
            entry.event_type,
            entry.user,
            entry.details,
            entry.user_agent,
            entry.client_ip,
        ],
    )?;
    Ok(())
}

fn select_entries(
    conn: &Connection,
    filter: Option<(&str, &str)>,
    limit: usize,
) -> Result<Vec<SessionLogEntry>, StoreError> {
    let limit = clamp_limit(limit);
    let rows = match filter {
        Some((column, value)) => {
            let mut stmt = conn.prepare(&format!(
                "{SELECT_COLUMNS} WHERE {column} = ?1 ORDER BY timestamp DESC LIMIT ?2"
            ))?;
            let rows = stmt
                .query_map(params![value, limit], row_to_entry)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        }
        None => {
            let mut stmt =
                conn.prepare(&format!("{SELECT_COLUMNS} ORDER BY timestamp DESC LIMIT ?1"))?;
            let rows = stmt
                .query_map(params![limit], row_to_entry)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        }
    };
    Ok(rows)
}

impl SecureStore {
    /// Client IP for a new audit row, or `"unknown"` when the lookup fails.
    async fn resolve_client_ip(&self) -> String {
        match self.ip_lookup.client_ip().await {
            Ok(ip) => ip,
            Err(e) => {
                warn!(error = %e, "client IP lookup failed; recording unknown");
                UNKNOWN_IP.to_owned()
            }
        }
    }

    fn new_entry(
        &self,
        nanos: i64,
        event_type: &str,
        user: &str,
        details: String,
        client_ip: String,
    ) -> SessionLogEntry {
        SessionLogEntry {
            timestamp: format_timestamp(nanos),
            event_type: event_type.to_owned(),
            user: user.to_owned(),
            details,
            user_agent: self.user_agent.clone(),
            client_ip,
        }
    }

    /// Append an audit row.
    ///
    /// The client IP comes from the configured
    /// [`IpLookup`](crate::ip_lookup::IpLookup); if that fails the row records
    /// `"unknown"` and the write still happens.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Serialization`] if `details` cannot be serialized.
    /// - [`StoreError::Database`] if the insert fails.
    pub async fn log_event(
        &self,
        event_type: &str,
        user: &str,
        details: &serde_json::Value,
    ) -> Result<SessionLogEntry, StoreError> {
        let details = serde_json::to_string(details)?;

        // Resolved before taking the connection lock so a slow lookup does not
        // stall other store calls.
        let client_ip = self.resolve_client_ip().await;

        let mut state = self.state.lock().await;
        let nanos = next_timestamp_nanos(now_nanos(), state.last_log_nanos);
        let entry = self.new_entry(nanos, event_type, user, details, client_ip);

        let tx = state
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        insert_entry(&tx, &entry)?;
        tx.commit()?;
        state.last_log_nanos = nanos;

        debug!(event_type, user, "audit event recorded");
        Ok(entry)
    }

    /// Persist `token` and append its audit row in one transaction.
    ///
    /// Either both rows are written or neither is, so a failed audit write
    /// never leaves behind a stored token nobody was handed.
    ///
    /// # Errors
    ///
    /// - [`StoreError::InvalidTtl`] if `ttl_secs` is zero or overflows.
    /// - [`StoreError::ConstraintViolation`] if the token is already stored.
    /// - [`StoreError::Serialization`] if `details` cannot be serialized.
    /// - [`StoreError::Database`] if either insert fails.
    pub async fn store_token_with_event(
        &self,
        token: &str,
        ttl_secs: u64,
        event_type: &str,
        user: &str,
        details: &serde_json::Value,
    ) -> Result<(TokenRecord, SessionLogEntry), StoreError> {
        let details = serde_json::to_string(details)?;
        let client_ip = self.resolve_client_ip().await;

        let mut state = self.state.lock().await;
        let nanos = next_timestamp_nanos(now_nanos(), state.last_log_nanos);
        let entry = self.new_entry(nanos, event_type, user, details, client_ip);
        let now_ms = now_millis();

        let tx = state
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let record = insert_token(&tx, token, ttl_secs, now_ms)?;
        insert_entry(&tx, &entry)?;
        tx.commit()?;
        state.last_log_nanos = nanos;

        debug!(event_type, user, ttl_secs, "token stored with audit event");
        Ok((record, entry))
    }

    /// The `limit` most recent audit rows, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    pub async fn get_session_logs(&self, limit: usize) -> Result<Vec<SessionLogEntry>, StoreError> {
        self.read(|tx| select_entries(tx, None, limit)).await
    }

    /// The `limit` most recent rows of one event type, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    pub async fn get_logs_by_type(
        &self,
        event_type: &str,
        limit: usize,
    ) -> Result<Vec<SessionLogEntry>, StoreError> {
        self.read(|tx| select_entries(tx, Some(("event_type", event_type)), limit))
            .await
    }

    /// The `limit` most recent rows for one user, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    pub async fn get_logs_by_user(
        &self,
        user: &str,
        limit: usize,
    ) -> Result<Vec<SessionLogEntry>, StoreError> {
        self.read(|tx| select_entries(tx, Some(("user", user)), limit))
            .await
    }
}
