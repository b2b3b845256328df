//! `portal-session`: signed session tokens for the secure portal.
//!
//! HS256 token minting and validation, store-backed revocation, a token
//! manager with single-flight refresh, a TTL cache, and the
//! [`SessionContext`] that ties them to one login session.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::arithmetic_side_effects))]

pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod jwt;
pub mod logging;
pub mod manager;
pub mod secret;
pub mod service;

pub use cache::{EphemeralCache, DEFAULT_CACHE_TTL};
pub use config::{load_config, PortalConfig};
pub use context::SessionContext;
pub use error::SessionError;
pub use jwt::{
    decode_jwt, is_token_expiring_soon, Claims, TokenSigner, AUDIENCE, DEFAULT_REFRESH_THRESHOLD_SECS,
    DEFAULT_TOKEN_TTL_SECS, ISSUER,
};
pub use logging::init_tracing;
pub use manager::{with_auto_refresh, TokenManager};
pub use secret::{EnvSecretProvider, SecretProvider, StaticSecretProvider, SECRET_ENV_VAR};
pub use service::{token_hash, TokenService};
