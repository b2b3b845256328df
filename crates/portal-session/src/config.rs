//! Portal runtime configuration: plain JSON plus environment overrides.
//!
//! The token signing secret is deliberately absent: it comes from a
//! [`SecretProvider`](crate::secret::SecretProvider).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use portal_store::DEFAULT_IP_LOOKUP_URL;
use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::jwt::{DEFAULT_REFRESH_THRESHOLD_SECS, DEFAULT_TOKEN_TTL_SECS};

// ── Environment overrides ─────────────────────────────────────────

pub const ENV_DB_PATH: &str = "PORTAL_DB_PATH";
pub const ENV_IP_LOOKUP_URL: &str = "PORTAL_IP_LOOKUP_URL";
pub const ENV_TOKEN_TTL_SECS: &str = "PORTAL_TOKEN_TTL_SECS";
pub const ENV_LOG_LEVEL: &str = "PORTAL_LOG_LEVEL";

// ── Top-level config ──────────────────────────────────────────────

/// Portal settings.
///
/// All fields have defaults via [`Default`], so an empty JSON object is a
/// valid config file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PortalConfig {
    /// `SQLite` file for the store; `None` keeps everything in memory.
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// `{ip}` JSON endpoint used for audit rows. Empty disables the lookup.
    #[serde(default = "default_ip_lookup_url")]
    pub ip_lookup_url: String,

    /// Upper bound on one IP lookup request.
    #[serde(default = "default_ip_lookup_timeout_ms")]
    pub ip_lookup_timeout_ms: u64,

    /// Lifetime of minted and refreshed tokens.
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,

    /// Remaining lifetime at which a token is refreshed.
    #[serde(default = "default_refresh_threshold_secs")]
    pub refresh_threshold_secs: u64,

    /// Ephemeral cache entry lifetime.
    #[serde(default = "default_cache_ttl_ms")]
    pub cache_ttl_ms: u64,

    /// User agent recorded in audit rows.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Default tracing filter, used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            ip_lookup_url: default_ip_lookup_url(),
            ip_lookup_timeout_ms: default_ip_lookup_timeout_ms(),
            token_ttl_secs: default_token_ttl_secs(),
            refresh_threshold_secs: default_refresh_threshold_secs(),
            cache_ttl_ms: default_cache_ttl_ms(),
            user_agent: default_user_agent(),
            log_level: default_log_level(),
        }
    }
}

fn default_ip_lookup_url() -> String {
    DEFAULT_IP_LOOKUP_URL.into()
}
const fn default_ip_lookup_timeout_ms() -> u64 {
    3_000
}
const fn default_token_ttl_secs() -> u64 {
    DEFAULT_TOKEN_TTL_SECS
}
const fn default_refresh_threshold_secs() -> u64 {
    DEFAULT_REFRESH_THRESHOLD_SECS
}
const fn default_cache_ttl_ms() -> u64 {
    300_000
}
fn default_user_agent() -> String {
    concat!("portal-session/", env!("CARGO_PKG_VERSION")).into()
}
fn default_log_level() -> String {
    "info".into()
}

// ── Derived values ────────────────────────────────────────────────

impl PortalConfig {
    #[must_use]
    pub const fn ip_lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.ip_lookup_timeout_ms)
    }

    #[must_use]
    pub const fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    /// Reject settings no component can honor.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Config`] naming the first bad field.
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.token_ttl_secs == 0 {
            return Err(SessionError::Config("tokenTtlSecs must be positive".into()));
        }
        if self.refresh_threshold_secs >= self.token_ttl_secs {
            return Err(SessionError::Config(
                "refreshThresholdSecs must be shorter than tokenTtlSecs".into(),
            ));
        }
        if self.cache_ttl_ms == 0 {
            return Err(SessionError::Config("cacheTtlMs must be positive".into()));
        }
        Ok(())
    }

    /// Apply overrides from `lookup` (normally the process environment).
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Config`] if a numeric override does not parse.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), SessionError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(ENV_DB_PATH) {
            self.database_path = Some(PathBuf::from(path));
        }
        if let Some(url) = lookup(ENV_IP_LOOKUP_URL) {
            self.ip_lookup_url = url;
        }
        if let Some(ttl) = lookup(ENV_TOKEN_TTL_SECS) {
            self.token_ttl_secs = ttl
                .trim()
                .parse()
                .map_err(|e| SessionError::Config(format!("{ENV_TOKEN_TTL_SECS}: {e}")))?;
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.log_level = level;
        }
        Ok(())
    }

    /// Persist as pretty JSON, writing a temp file and renaming over `path`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Config`] if the write or rename fails.
    pub fn save(&self, path: &Path) -> Result<(), SessionError> {
        let json = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)
            .and_then(|()| fs::rename(&tmp, path))
            .map_err(|e| SessionError::Config(format!("cannot write {}: {e}", path.display())))
    }
}

// ── Loading ───────────────────────────────────────────────────────

/// Load `path`, apply environment overrides, and validate.
///
/// A missing file yields the defaults; a malformed one is an error.
///
/// # Errors
///
/// Returns [`SessionError::Config`] if the file cannot be read or parsed, an
/// override is malformed, or the result fails [`PortalConfig::validate`].
pub fn load_config(path: &Path) -> Result<PortalConfig, SessionError> {
    let mut config = match fs::read_to_string(path) {
        Ok(contents) => serde_json::from_str(&contents)
            .map_err(|e| SessionError::Config(format!("{}: {e}", path.display())))?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => PortalConfig::default(),
        Err(e) => {
            return Err(SessionError::Config(format!(
                "cannot read {}: {e}",
                path.display()
            )))
        }
    };
    config.apply_overrides(|name| std::env::var(name).ok())?;
    config.validate()?;
    Ok(config)
}

// ── Tests ─────────────────────────────────────────────────────────
