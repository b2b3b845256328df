#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]

//! End-to-end session lifecycle over an on-disk store.

use std::sync::Arc;
use std::time::Duration;

use portal_session::{
    decode_jwt, Claims, PortalConfig, SessionContext, StaticSecretProvider,
};
use portal_store::{events, SecureStore, StaticIpLookup, StoreOptions};
use serde_json::json;

fn config(dir: &tempfile::TempDir) -> PortalConfig {
    PortalConfig {
        database_path: Some(dir.path().join("portal.db")),
        ip_lookup_url: String::new(),
        ..PortalConfig::default()
    }
}

/// Make every later audit insert on the database at `dir` fail.
fn reject_audit_writes(dir: &tempfile::TempDir) {
    let conn = rusqlite::Connection::open(dir.path().join("portal.db")).unwrap();
    conn.execute_batch(
        "CREATE TRIGGER reject_audit BEFORE INSERT ON session_logs \
         BEGIN SELECT RAISE(ABORT, 'audit unavailable'); END;",
    )
    .unwrap();
}

fn alice() -> Claims {
    json!({"userId": "alice", "displayName": "Alice"})
        .as_object()
        .cloned()
        .unwrap()
}

#[tokio::test]
async fn start_session_persists_and_audits() {
    let dir = tempfile::tempdir().expect("tempdir");
    let secrets = StaticSecretProvider::random().unwrap();
    let ctx = SessionContext::open(config(&dir), &secrets).await.unwrap();

    let token = ctx.start_session(&alice()).await.unwrap();
    assert_eq!(ctx.manager().get_token().as_deref(), Some(token.as_str()));
    assert_eq!(
        ctx.store().get_valid_token().await.unwrap().as_deref(),
        Some(token.as_str())
    );
    assert!(ctx.is_valid().await.unwrap());

    let started = ctx
        .store()
        .get_logs_by_type(events::SESSION_STARTED, 10)
        .await
        .unwrap();
    assert_eq!(started.len(), 1);
    assert_eq!(started[0].user, "alice");
    assert_eq!(started[0].client_ip, "unknown");
}

#[tokio::test]
async fn session_survives_reopen_with_same_secret() {
    let dir = tempfile::tempdir().expect("tempdir");
    let secrets = StaticSecretProvider::random().unwrap();
    let token = {
        let ctx = SessionContext::open(config(&dir), &secrets).await.unwrap();
        ctx.start_session(&alice()).await.unwrap()
    };

    let ctx = SessionContext::open(config(&dir), &secrets).await.unwrap();
    assert_eq!(ctx.refresh_if_needed().await.unwrap(), Some(token.clone()));
    assert_eq!(ctx.manager().get_token(), Some(token));
    assert!(ctx.is_valid().await.unwrap());
}

#[tokio::test]
async fn reopen_with_other_secret_invalidates() {
    let dir = tempfile::tempdir().expect("tempdir");
    {
        let ctx = SessionContext::open(config(&dir), &StaticSecretProvider::random().unwrap())
            .await
            .unwrap();
        ctx.start_session(&alice()).await.unwrap();
    }
    let ctx = SessionContext::open(config(&dir), &StaticSecretProvider::random().unwrap())
        .await
        .unwrap();
    assert!(!ctx.is_valid().await.unwrap());
    // The display decode does not care about the secret.
    let shown = ctx.service().current_display_claims().await.unwrap().unwrap();
    assert_eq!(shown["displayName"], "Alice");
}

#[tokio::test]
async fn refresh_if_needed_refreshes_expiring_token() {
    let dir = tempfile::tempdir().expect("tempdir");
    let ctx = SessionContext::open(config(&dir), &StaticSecretProvider::random().unwrap())
        .await
        .unwrap();
    let short = ctx.service().issue_token(&alice(), 60).await.unwrap();

    let fresh = ctx.refresh_if_needed().await.unwrap().unwrap();
    assert_ne!(fresh, short);
    assert_eq!(decode_jwt(&fresh).unwrap()["userId"], "alice");
    assert_eq!(ctx.manager().get_token(), Some(fresh.clone()));
    assert_eq!(
        ctx.store().get_valid_token().await.unwrap(),
        Some(fresh)
    );
}

#[tokio::test]
async fn refresh_if_needed_swallows_refresh_failure() {
    let store = Arc::new(
        SecureStore::open_in_memory(StoreOptions {
            ip_lookup: Arc::new(StaticIpLookup::unavailable()),
            user_agent: "flow".into(),
        })
        .await
        .unwrap(),
    );
    // A stored token this context's signer did not mint.
    store.store_token("aaa.bbb.ccc", 60).await.unwrap();

    let signer = portal_session::TokenSigner::from_provider(
        &StaticSecretProvider::random().unwrap(),
    )
    .unwrap();
    let ctx = SessionContext::new(PortalConfig::default(), signer, store);
    assert_eq!(ctx.refresh_if_needed().await.unwrap(), None);
}

#[tokio::test]
async fn refresh_if_needed_without_token_is_none() {
    let dir = tempfile::tempdir().expect("tempdir");
    let ctx = SessionContext::open(config(&dir), &StaticSecretProvider::random().unwrap())
        .await
        .unwrap();
    assert_eq!(ctx.refresh_if_needed().await.unwrap(), None);
    assert_eq!(ctx.manager().get_token(), None);
}

#[tokio::test]
async fn logout_revokes_and_clears() {
    let dir = tempfile::tempdir().expect("tempdir");
    let ctx = SessionContext::open(config(&dir), &StaticSecretProvider::random().unwrap())
        .await
        .unwrap();
    let token = ctx.start_session(&alice()).await.unwrap();
    ctx.cache().set("scratch", "value".to_owned());

    ctx.logout().await.unwrap();

    assert_eq!(ctx.manager().get_token(), None);
    assert!(ctx.cache().is_empty());
    assert!(ctx.service().validate_jwt(&token).await.is_none());
    assert!(!ctx.is_valid().await.unwrap());

    let alice_rows = ctx.store().get_logs_by_user("alice", 10).await.unwrap();
    let kinds: Vec<&str> = alice_rows.iter().map(|e| e.event_type.as_str()).collect();
    assert_eq!(
        kinds,
        vec![events::SESSION_ENDED, events::JWT_REVOKED, events::SESSION_STARTED]
    );
}

#[tokio::test]
async fn one_second_token_expires() {
    let dir = tempfile::tempdir().expect("tempdir");
    let ctx = SessionContext::open(config(&dir), &StaticSecretProvider::random().unwrap())
        .await
        .unwrap();
    let signer = ctx.service().signer();
    let token = signer.generate_jwt(&alice(), 1).unwrap();
    assert!(signer.validate_jwt(&token).is_some());

    tokio::time::sleep(Duration::from_millis(2_100)).await;

    assert!(signer.validate_jwt(&token).is_none());
    // Only the expiry changed: the signature still verifies at an earlier instant.
    let exp = decode_jwt(&token).unwrap()["exp"].as_i64().unwrap();
    assert!(signer.validate_jwt_at(&token, exp - 1).is_some());
}

#[tokio::test]
async fn failed_refresh_audit_leaves_old_token_current_and_stored() {
    let dir = tempfile::tempdir().expect("tempdir");
    let secrets = StaticSecretProvider::random().unwrap();
    let ctx = SessionContext::open(config(&dir), &secrets).await.unwrap();
    let old = ctx.start_session(&alice()).await.unwrap();

    reject_audit_writes(&dir);
    assert!(ctx.manager().refresh_token().await.is_err());

    assert_eq!(ctx.manager().get_token().as_deref(), Some(old.as_str()));
    assert_eq!(
        ctx.store().get_valid_token().await.unwrap().as_deref(),
        Some(old.as_str())
    );
    assert_eq!(ctx.store().get_tokens().await.unwrap().len(), 1);
}

#[tokio::test]
async fn failed_login_audit_stores_nothing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let secrets = StaticSecretProvider::random().unwrap();
    let ctx = SessionContext::open(config(&dir), &secrets).await.unwrap();

    reject_audit_writes(&dir);
    assert!(ctx.start_session(&alice()).await.is_err());

    assert_eq!(ctx.manager().get_token(), None);
    assert!(ctx.store().get_tokens().await.unwrap().is_empty());
    assert!(!ctx.is_valid().await.unwrap());
}
