//! Per-session object owning the store, token service, token manager, and
//! ephemeral cache. Created at login, cleared at logout; there is no global
//! instance.

use std::sync::Arc;

use portal_crypto_core::{generate_browser_fingerprint, ClientEnvironment};
use portal_store::{events, HttpIpLookup, IpLookup, SecureStore, StaticIpLookup, StoreOptions};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::cache::EphemeralCache;
use crate::config::PortalConfig;
use crate::error::SessionError;
use crate::jwt::{decode_jwt, Claims, TokenSigner};
use crate::logging::init_tracing;
use crate::manager::TokenManager;
use crate::secret::SecretProvider;
use crate::service::{user_of, TokenService, UNKNOWN};

const FINGERPRINT_KEY_PREFIX: &str = "fingerprint:";

#[derive(Debug)]
pub struct SessionContext {
    config: PortalConfig,
    service: Arc<TokenService>,
    manager: TokenManager,
    cache: EphemeralCache<String>,
}

impl SessionContext {
    /// Install tracing at the configured level, open the configured store,
    /// and build a context around it.
    ///
    /// An already installed global subscriber is left in place.
    ///
    /// # Errors
    ///
    /// - [`SessionError::Config`] if the config is invalid.
    /// - [`SessionError::Secret`] if `secrets` has no usable signing secret.
    /// - [`SessionError::Store`] if the store cannot be opened.
    pub async fn open(
        config: PortalConfig,
        secrets: &dyn SecretProvider,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        if init_tracing(&config.log_level) {
            debug!(level = %config.log_level, "tracing initialized");
        }
        let signer = TokenSigner::from_provider(secrets)?;

        let ip_lookup: Arc<dyn IpLookup> = if config.ip_lookup_url.is_empty() {
            Arc::new(StaticIpLookup::unavailable())
        } else {
            Arc::new(HttpIpLookup::new(
                config.ip_lookup_url.clone(),
                config.ip_lookup_timeout(),
            )?)
        };
        let options = StoreOptions {
            ip_lookup,
            user_agent: config.user_agent.clone(),
        };
        let store = match &config.database_path {
            Some(path) => SecureStore::open(path, options).await?,
            None => SecureStore::open_in_memory(options).await?,
        };

        Ok(Self::new(config, signer, Arc::new(store)))
    }

    /// Build a context over an already-open store.
    #[must_use]
    pub fn new(config: PortalConfig, signer: TokenSigner, store: Arc<SecureStore>) -> Self {
        let service = Arc::new(TokenService::new(signer, store));
        let manager = TokenManager::with_settings(
            Arc::clone(&service),
            config.token_ttl_secs,
            config.refresh_threshold_secs,
        );
        let cache = EphemeralCache::new(config.cache_ttl());
        Self {
            config,
            service,
            manager,
            cache,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &PortalConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &Arc<SecureStore> {
        self.service.store()
    }

    #[must_use]
    pub const fn service(&self) -> &Arc<TokenService> {
        &self.service
    }

    #[must_use]
    pub const fn manager(&self) -> &TokenManager {
        &self.manager
    }

    #[must_use]
    pub const fn cache(&self) -> &EphemeralCache<String> {
        &self.cache
    }

    /// Mint and persist a token for `claims` with a `SESSION_STARTED` audit
    /// row, then make it current.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Store`] if the token or the audit row cannot be
    /// written; the current token is then left unchanged.
    pub async fn start_session(&self, claims: &Claims) -> Result<String, SessionError> {
        let token = self
            .service
            .start_session(claims, self.config.token_ttl_secs)
            .await?;
        self.manager.set_token(token.clone());
        info!(user = %user_of(claims), "session started");
        Ok(token)
    }

    /// Whether the stored token still validates.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Store`] if the token read fails.
    pub async fn is_valid(&self) -> Result<bool, SessionError> {
        Ok(self.service.current_claims().await?.is_some())
    }

    /// Load the stored valid token into the manager and refresh it if it is
    /// close to expiry.
    ///
    /// Returns `None` when nothing is stored or the refresh fails; a refresh
    /// failure is logged, not returned.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Store`] if the token read fails.
    pub async fn refresh_if_needed(&self) -> Result<Option<String>, SessionError> {
        let Some(token) = self.store().get_valid_token().await? else {
            return Ok(None);
        };
        self.manager.set_token(token.clone());

        if !self.manager.should_refresh_token() {
            return Ok(Some(token));
        }
        match self.manager.refresh_token().await {
            Ok(fresh) => Ok(Some(fresh)),
            Err(e) => {
                warn!(error = %e, "token refresh failed");
                Ok(None)
            }
        }
    }

    /// Browser fingerprint for `env`, memoized in the ephemeral cache.
    #[must_use]
    pub fn browser_fingerprint(&self, env: &ClientEnvironment) -> String {
        let key = format!(
            "{FINGERPRINT_KEY_PREFIX}{}|{}|{}x{}|{}",
            env.user_agent,
            env.language,
            env.screen_width,
            env.screen_height,
            env.timezone_offset_minutes
        );
        if let Some(hit) = self.cache.get(&key) {
            return hit;
        }
        let fingerprint = generate_browser_fingerprint(env);
        self.cache.set(key, fingerprint.clone());
        fingerprint
    }

    /// End the session: revoke the current token, record `SESSION_ENDED`,
    /// and clear the token manager and the cache.
    ///
    /// Local state is cleared even when the audit write fails.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Store`] if the `SESSION_ENDED` row cannot be written.
    pub async fn logout(&self) -> Result<(), SessionError> {
        let token = self.manager.get_token();
        self.manager.clear_token();
        self.cache.clear();

        let Some(token) = token else {
            return Ok(());
        };
        let user = decode_jwt(&token)
            .map_or_else(|| UNKNOWN.to_owned(), |claims| user_of(&claims).to_owned());
        if !self.service.revoke_jwt(&token).await {
            warn!(user = %user, "could not revoke token at logout");
        }
        self.store()
            .log_event(events::SESSION_ENDED, &user, &json!({}))
            .await?;
        info!(user = %user, "session ended");
        Ok(())
    }
}
