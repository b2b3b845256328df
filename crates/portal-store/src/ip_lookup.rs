//! Client IP resolution for audit rows.
//!
//! The lookup is best-effort: [`SecureStore::log_event`](crate::SecureStore::log_event)
//! records [`UNKNOWN_IP`] whenever the collaborator fails, and the write goes ahead.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::StoreError;

/// Placeholder recorded when the client IP cannot be resolved.
pub const UNKNOWN_IP: &str = "unknown";

/// Default public echo endpoint returning `{"ip": "..."}`.
pub const DEFAULT_IP_LOOKUP_URL: &str = "https://api.ipify.org?format=json";

/// Resolves the client's public IP address.
#[async_trait]
pub trait IpLookup: Send + Sync {
    /// Return the client IP as text.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::IpLookup`] on any failure.
    async fn client_ip(&self) -> Result<String, StoreError>;
}

#[derive(Debug, Deserialize)]
struct IpResponse {
    ip: String,
}

/// HTTPS JSON lookup against an `{ip: string}` endpoint.
#[derive(Debug, Clone)]
pub struct HttpIpLookup {
    client: reqwest::Client,
    url: String,
}

impl HttpIpLookup {
    /// Build a lookup against `url`, bounded by `timeout` per request.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::IpLookup`] if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::IpLookup(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl IpLookup for HttpIpLookup {
    async fn client_ip(&self) -> Result<String, StoreError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| StoreError::IpLookup(e.to_string()))?;
        let body: IpResponse = response
            .json()
            .await
            .map_err(|e| StoreError::IpLookup(format!("malformed response: {e}")))?;
        Ok(body.ip)
    }
}

/// Fixed answer, or a lookup that always fails when built with
/// [`StaticIpLookup::unavailable`]. Used offline and in tests.
#[derive(Debug, Clone, Default)]
pub struct StaticIpLookup {
    ip: Option<String>,
}

impl StaticIpLookup {
    /// Always resolve to `ip`.
    #[must_use]
    pub fn new(ip: impl Into<String>) -> Self {
        Self {
            ip: Some(ip.into()),
        }
    }

    /// Always fail, so audit rows record [`UNKNOWN_IP`].
    #[must_use]
    pub const fn unavailable() -> Self {
        Self { ip: None }
    }
}

#[async_trait]
impl IpLookup for StaticIpLookup {
    async fn client_ip(&self) -> Result<String, StoreError> {
        self.ip
            .clone()
            .ok_or_else(|| StoreError::IpLookup("no client IP configured".into()))
    }
}
