//! Connection handling, transaction scoping, and the migration runner.
//!
//! A [`SecureStore`] owns one `SQLite` connection behind an async mutex.
//! Every public operation runs in its own transaction: `IMMEDIATE` for
//! writes so the write lock is taken up front, `DEFERRED` for reads.
//! There is no atomicity across calls.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::ip_lookup::{IpLookup, StaticIpLookup};

// ---------------------------------------------------------------------------
// Embedded migrations
// ---------------------------------------------------------------------------

/// Forward-only SQL migrations, embedded at compile time.
/// Index 0 → version 1, index 1 → version 2, etc.
///
/// Every statement is `IF NOT EXISTS`, so a partially applied upgrade can be
/// rerun safely.
const MIGRATIONS: &[&str] = &[
    include_str!("../migrations/001_initial_schema.sql"),
    include_str!("../migrations/002_revoked_tokens.sql"),
];

/// Schema version after all embedded migrations are applied.
pub const SCHEMA_VERSION: i32 = 2;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Collaborators and client metadata attached to audit rows.
#[derive(Clone)]
pub struct StoreOptions {
    /// Resolves the client IP recorded with each audit event.
    pub ip_lookup: Arc<dyn IpLookup>,
    /// User agent recorded with each audit event.
    pub user_agent: String,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            ip_lookup: Arc::new(StaticIpLookup::unavailable()),
            user_agent: concat!("portal-store/", env!("CARGO_PKG_VERSION")).to_owned(),
        }
    }
}

impl fmt::Debug for StoreOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreOptions")
            .field("user_agent", &self.user_agent)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// SecureStore
// ---------------------------------------------------------------------------

/// State guarded by the connection mutex.
pub(crate) struct StoreState {
    pub(crate) conn: Connection,
    /// Nanosecond timestamp of the newest audit row written by this handle.
    pub(crate) last_log_nanos: i64,
}

/// Handle to the portal's persistent store.
///
/// Exposes three collections: WebAuthn credentials, session tokens, and the
/// audit log. Share it behind an `Arc`; all methods take `&self`.
pub struct SecureStore {
    pub(crate) state: Mutex<StoreState>,
    pub(crate) ip_lookup: Arc<dyn IpLookup>,
    pub(crate) user_agent: String,
}

impl fmt::Debug for SecureStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecureStore(***)")
    }
}

impl SecureStore {
    /// Open (or create) the store at `path` and bring its schema up to date.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Database`] if the file cannot be opened.
    /// - [`StoreError::Migration`] if a migration fails.
    pub async fn open(path: &Path, options: StoreOptions) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        info!(path = %path.display(), "opening secure store");
        Self::from_connection(conn, options).await
    }

    /// Open a private in-memory store, for tests and ephemeral sessions.
    ///
    /// # Errors
    ///
    /// Same as [`open`](Self::open).
    pub async fn open_in_memory(options: StoreOptions) -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, options).await
    }

    async fn from_connection(conn: Connection, options: StoreOptions) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let store = Self {
            state: Mutex::new(StoreState {
                conn,
                last_log_nanos: 0,
            }),
            ip_lookup: options.ip_lookup,
            user_agent: options.user_agent,
        };
        store.init().await?;
        Ok(store)
    }

    /// Create any missing collection or index and record the schema version.
    ///
    /// Idempotent: once the schema is current, further calls change nothing.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Migration`] if a migration fails.
    pub async fn init(&self) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        run_migrations(&mut state.conn)?;
        let newest = newest_log_nanos(&state.conn)?;
        state.last_log_nanos = state.last_log_nanos.max(newest);
        Ok(())
    }

    /// Returns the current schema version (`PRAGMA user_version`).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the pragma query fails.
    pub async fn schema_version(&self) -> Result<i32, StoreError> {
        let state = self.state.lock().await;
        schema_version(&state.conn)
    }

    /// Run `f` inside a read-write (`IMMEDIATE`) transaction and commit.
    pub(crate) async fn write<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, StoreError> + Send,
    {
        let mut state = self.state.lock().await;
        let tx = state
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }

    /// Run `f` inside a read (`DEFERRED`) transaction.
    pub(crate) async fn read<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, StoreError> + Send,
    {
        let mut state = self.state.lock().await;
        let tx = state
            .conn
            .transaction_with_behavior(TransactionBehavior::Deferred)?;
        f(&tx)
    }
}

// ---------------------------------------------------------------------------
// Migration runner
// ---------------------------------------------------------------------------

pub(crate) fn schema_version(conn: &Connection) -> Result<i32, StoreError> {
    let v: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    Ok(v)
}

/// Apply all pending migrations sequentially.
///
/// Each migration is wrapped in a transaction. The `user_version` pragma
/// is bumped atomically on commit.
pub(crate) fn run_migrations(conn: &mut Connection) -> Result<(), StoreError> {
    let current = schema_version(conn)?;

    for (idx, sql) in MIGRATIONS.iter().enumerate() {
        // Migration versions are 1-indexed: index 0 → version 1.
        let version = idx
            .checked_add(1)
            .and_then(|v| i32::try_from(v).ok())
            .ok_or_else(|| StoreError::Migration("migration index overflow".into()))?;

        if version <= current {
            continue;
        }

        let tx = conn.transaction().map_err(|e| {
            StoreError::Migration(format!(
                "failed to start transaction for migration {version}: {e}"
            ))
        })?;

        tx.execute_batch(sql)
            .map_err(|e| StoreError::Migration(format!("migration {version} failed: {e}")))?;

        tx.pragma_update(None, "user_version", version)
            .map_err(|e| {
                StoreError::Migration(format!("failed to update user_version to {version}: {e}"))
            })?;

        tx.commit().map_err(|e| {
            StoreError::Migration(format!("failed to commit migration {version}: {e}"))
        })?;

        debug!(version, "applied store migration");
    }

    Ok(())
}

fn newest_log_nanos(conn: &Connection) -> Result<i64, StoreError> {
    let newest: Option<String> =
        conn.query_row("SELECT MAX(timestamp) FROM session_logs", [], |row| row.get(0))?;
    Ok(newest
        .as_deref()
        .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
        .and_then(|ts| ts.with_timezone(&Utc).timestamp_nanos_opt())
        .unwrap_or(0))
}

// ---------------------------------------------------------------------------
// Time helpers
// ---------------------------------------------------------------------------

/// Current time as Unix milliseconds.
pub(crate) fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Unix milliseconds back to a UTC timestamp; out-of-range values clamp to the epoch.
pub(crate) fn millis_to_datetime(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
