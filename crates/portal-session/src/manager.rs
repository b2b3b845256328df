//! Stateful holder of the current session token with single-flight refresh.
//!
//! At most one refresh runs per manager. The first caller installs a
//! broadcast handle and spawns the mint-and-persist task; every concurrent
//! caller subscribes to that handle and receives the same outcome. The task
//! clears the handle before publishing, so the next call after completion
//! starts a fresh refresh.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::error::SessionError;
use crate::jwt::{
    is_token_expiring_soon, Claims, DEFAULT_REFRESH_THRESHOLD_SECS, DEFAULT_TOKEN_TTL_SECS,
};
use crate::service::TokenService;

type RefreshOutcome = Result<String, SessionError>;

#[derive(Default)]
struct ManagerState {
    current: Option<String>,
    in_flight: Option<broadcast::Sender<RefreshOutcome>>,
    /// Bumped by `clear_token`; a refresh started under an older generation
    /// publishes to its waiters but does not touch the state.
    generation: u64,
}

struct Inner {
    service: Arc<TokenService>,
    ttl_secs: u64,
    refresh_threshold_secs: u64,
    state: Mutex<ManagerState>,
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, ManagerState> {
        // No code path panics while holding the lock, so a poisoned state is
        // still consistent.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn run_refresh(
        self: Arc<Self>,
        current: String,
        generation: u64,
        sender: broadcast::Sender<RefreshOutcome>,
    ) {
        let mut slot = RefreshSlot {
            inner: Arc::clone(&self),
            generation,
            settled: false,
        };
        let outcome = self.service.refresh_jwt(&current, self.ttl_secs).await;
        slot.settle(&outcome);

        if let Err(e) = &outcome {
            warn!(error = %e, "token refresh failed");
        }
        if sender.send(outcome).is_err() {
            debug!("token refresh finished with no waiters");
        }
    }
}

/// The refresh task's claim on `ManagerState::in_flight`.
///
/// If the task ends without settling (panic or abort), dropping the slot
/// releases the stored sender, so waiters see the channel close and get
/// [`SessionError::RefreshAborted`].
struct RefreshSlot {
    inner: Arc<Inner>,
    generation: u64,
    settled: bool,
}

impl RefreshSlot {
    /// Release the in-flight handle and install a successful outcome, unless
    /// the session was cleared meanwhile.
    fn settle(&mut self, outcome: &RefreshOutcome) {
        self.settled = true;
        let mut state = self.inner.lock_state();
        if state.generation != self.generation {
            debug!("session cleared during refresh; result not retained");
            return;
        }
        state.in_flight = None;
        if let Ok(token) = outcome {
            state.current = Some(token.clone());
        }
    }
}

impl Drop for RefreshSlot {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        warn!("token refresh task ended without a result");
        let mut state = self.inner.lock_state();
        if state.generation == self.generation {
            state.in_flight = None;
        }
    }
}

/// Holds the current session token and coordinates refreshes.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct TokenManager {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.lock_state();
        f.debug_struct("TokenManager")
            .field("has_token", &state.current.is_some())
            .field("refreshing", &state.in_flight.is_some())
            .finish_non_exhaustive()
    }
}

impl TokenManager {
    /// Manager using the default lifetime and refresh window.
    #[must_use]
    pub fn new(service: Arc<TokenService>) -> Self {
        Self::with_settings(service, DEFAULT_TOKEN_TTL_SECS, DEFAULT_REFRESH_THRESHOLD_SECS)
    }

    #[must_use]
    pub fn with_settings(
        service: Arc<TokenService>,
        ttl_secs: u64,
        refresh_threshold_secs: u64,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                service,
                ttl_secs,
                refresh_threshold_secs,
                state: Mutex::new(ManagerState::default()),
            }),
        }
    }

    pub fn set_token(&self, token: impl Into<String>) {
        self.inner.lock_state().current = Some(token.into());
    }

    #[must_use]
    pub fn get_token(&self) -> Option<String> {
        self.inner.lock_state().current.clone()
    }

    /// Drop the current token and detach any in-flight refresh.
    ///
    /// Callers already waiting on that refresh still receive its outcome, but
    /// the outcome is not installed as the current token.
    pub fn clear_token(&self) {
        let mut state = self.inner.lock_state();
        state.current = None;
        state.in_flight = None;
        state.generation = state.generation.wrapping_add(1);
    }

    /// Whether a refresh is currently in flight.
    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        self.inner.lock_state().in_flight.is_some()
    }

    /// Refresh the current token, sharing one mint-and-persist among all
    /// concurrent callers.
    ///
    /// On failure every waiter receives the error and the current token is
    /// left unchanged.
    ///
    /// # Errors
    ///
    /// - [`SessionError::NoCurrentToken`] if no token is held.
    /// - [`SessionError::InvalidToken`] if the current token does not validate.
    /// - [`SessionError::Store`] if persisting the new token fails.
    /// - [`SessionError::RefreshAborted`] if the refresh task panicked or was
    ///   dropped before publishing a result.
    pub async fn refresh_token(&self) -> Result<String, SessionError> {
        let mut receiver = {
            let mut state = self.inner.lock_state();
            if let Some(sender) = &state.in_flight {
                debug!(waiters = sender.receiver_count(), "joining in-flight token refresh");
                sender.subscribe()
            } else {
                let current = state.current.clone().ok_or(SessionError::NoCurrentToken)?;
                let (sender, receiver) = broadcast::channel(1);
                state.in_flight = Some(sender.clone());
                let generation = state.generation;
                tokio::spawn(Arc::clone(&self.inner).run_refresh(current, generation, sender));
                receiver
            }
        };

        receiver
            .recv()
            .await
            .unwrap_or(Err(SessionError::RefreshAborted))
    }

    /// Validate the current token, revocation included.
    pub async fn validate_current_token(&self) -> Option<Claims> {
        let token = self.get_token()?;
        self.inner.service.validate_jwt(&token).await
    }

    /// True if a token is held and it is within the refresh window.
    #[must_use]
    pub fn should_refresh_token(&self) -> bool {
        self.get_token()
            .is_some_and(|token| is_token_expiring_soon(&token, self.inner.refresh_threshold_secs))
    }
}

/// Refresh the manager's token first if it is about to expire, then run
/// `operation`.
///
/// # Errors
///
/// Propagates the refresh error; `operation` is not run in that case.
pub async fn with_auto_refresh<F, Fut, T>(
    manager: &TokenManager,
    operation: F,
) -> Result<T, SessionError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
{
    if manager.should_refresh_token() {
        manager.refresh_token().await?;
    }
    Ok(operation().await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwt::TokenSigner;
    use portal_crypto_core::SecretBuffer;
    use portal_store::{SecureStore, StoreOptions};
    use serde_json::json;

    async fn manager(ttl_secs: u64, threshold_secs: u64) -> TokenManager {
        let store = SecureStore::open_in_memory(StoreOptions::default())
            .await
            .unwrap();
        let service = TokenService::new(
            TokenSigner::new(&SecretBuffer::new(&[0x33; 32])),
            Arc::new(store),
        );
        TokenManager::with_settings(Arc::new(service), ttl_secs, threshold_secs)
    }

    fn claims() -> Claims {
        json!({"userId": "alice"}).as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn set_get_clear() {
        let manager = manager(3600, 300).await;
        assert_eq!(manager.get_token(), None);
        manager.set_token("abc");
        assert_eq!(manager.get_token().as_deref(), Some("abc"));
        manager.clear_token();
        assert_eq!(manager.get_token(), None);
    }

    #[tokio::test]
    async fn refresh_without_token_fails() {
        let manager = manager(3600, 300).await;
        assert_eq!(
            manager.refresh_token().await.unwrap_err(),
            SessionError::NoCurrentToken
        );
        assert!(!manager.is_refreshing());
    }

    #[tokio::test]
    async fn refresh_replaces_current_token() {
        let manager = manager(3600, 300).await;
        let token = manager.inner.service.issue_token(&claims(), 3600).await.unwrap();
        manager.set_token(token.clone());

        let refreshed = manager.refresh_token().await.unwrap();
        assert_ne!(refreshed, token);
        assert_eq!(manager.get_token(), Some(refreshed));
        assert!(!manager.is_refreshing());
    }

    #[tokio::test]
    async fn failed_refresh_keeps_current_token() {
        let manager = manager(3600, 300).await;
        manager.set_token("garbage");
        assert_eq!(
            manager.refresh_token().await.unwrap_err(),
            SessionError::InvalidToken
        );
        assert_eq!(manager.get_token().as_deref(), Some("garbage"));
        assert!(!manager.is_refreshing());
    }

    #[tokio::test]
    async fn should_refresh_respects_threshold() {
        let manager = manager(3600, 300).await;
        assert!(!manager.should_refresh_token());

        let signer = manager.inner.service.signer();
        manager.set_token(signer.generate_jwt(&claims(), 3600).unwrap());
        assert!(!manager.should_refresh_token());

        manager.set_token(signer.generate_jwt(&claims(), 120).unwrap());
        assert!(manager.should_refresh_token());
    }

    #[tokio::test]
    async fn validate_current_token_delegates() {
        let manager = manager(3600, 300).await;
        assert!(manager.validate_current_token().await.is_none());
        let token = manager.inner.service.signer().generate_jwt(&claims(), 60).unwrap();
        manager.set_token(token);
        assert_eq!(
            manager.validate_current_token().await.unwrap()["userId"],
            "alice"
        );
    }

    #[tokio::test]
    async fn auto_refresh_skips_fresh_token() {
        let manager = manager(3600, 300).await;
        let token = manager.inner.service.signer().generate_jwt(&claims(), 3600).unwrap();
        manager.set_token(token.clone());

        let out = with_auto_refresh(&manager, || async { 7 }).await.unwrap();
        assert_eq!(out, 7);
        assert_eq!(manager.get_token(), Some(token));
    }

    #[tokio::test]
    async fn auto_refresh_refreshes_expiring_token() {
        let manager = manager(3600, 300).await;
        let token = manager.inner.service.signer().generate_jwt(&claims(), 60).unwrap();
        manager.set_token(token.clone());

        let arg = String::from("payload");
        let out = with_auto_refresh(&manager, || async move { arg.len() })
            .await
            .unwrap();
        assert_eq!(out, 7);
        assert_ne!(manager.get_token(), Some(token));
    }

    #[tokio::test]
    async fn auto_refresh_propagates_failure() {
        let manager = manager(3600, 300).await;
        manager.set_token("garbage");
        let mut ran = false;
        let result = with_auto_refresh(&manager, || async {
            ran = true;
        })
        .await;
        assert_eq!(result.unwrap_err(), SessionError::InvalidToken);
        assert!(!ran);
    }
}
