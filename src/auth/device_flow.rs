//! Device authorization exchange against the identity provider.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use reqwest::header::USER_AGENT;
use serde::Deserialize;

use super::clock::{Clock, SystemClock};
use super::device_code::{DeviceCodePoll, DeviceCodeSession};
use super::error::AuthError;
use super::http::{build_client, COPILOT_USER_AGENT};
use crate::config::AuthConfig;

const DEVICE_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:device_code";
const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// One-shot operations of the device authorization grant.
///
/// Implementations perform a single request per call; spacing polls and
/// stopping at expiry is the caller's job.
#[async_trait]
pub trait DeviceFlow: Send + Sync {
    /// Request a fresh device/user code pair.
    async fn start(&self) -> Result<DeviceCodeSession, AuthError>;

    /// Ask once whether the user has finished authorizing.
    async fn poll(&self, session: &DeviceCodeSession) -> Result<DeviceCodePoll, AuthError>;

    /// Look up a display name for the account behind `provider_token`.
    async fn account_identifier(&self, provider_token: &str) -> Result<Option<String>, AuthError> {
        let _ = provider_token;
        Ok(None)
    }
}

/// GitHub OAuth device flow.
///
/// # Example
/// ```no_run
/// use copilot_auth::auth::{DeviceFlow, GitHubDeviceFlow};
/// use copilot_auth::config::AuthConfig;
///
/// # async fn example() -> Result<(), copilot_auth::auth::AuthError> {
/// let flow = GitHubDeviceFlow::new(&AuthConfig::default())?;
/// let session = flow.start().await?;
/// println!("{} {}", session.verification_url, session.user_code);
/// # Ok(())
/// # }
/// ```
pub struct GitHubDeviceFlow {
    client: reqwest::Client,
    client_id: String,
    scope: String,
    device_code_url: String,
    access_token_url: String,
    user_url: String,
    clock: Arc<dyn Clock>,
}

impl GitHubDeviceFlow {
    pub fn new(config: &AuthConfig) -> Result<Self, AuthError> {
        Ok(Self {
            client: build_client(config.request_timeout)?,
            client_id: config.client_id.clone(),
            scope: config.scope.clone(),
            device_code_url: config.device_code_url.clone(),
            access_token_url: config.access_token_url.clone(),
            user_url: config.user_url.clone(),
            clock: Arc::new(SystemClock),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

#[async_trait]
impl DeviceFlow for GitHubDeviceFlow {
    async fn start(&self) -> Result<DeviceCodeSession, AuthError> {
        let resp = self
            .client
            .post(&self.device_code_url)
            .header("Accept", "application/json")
            .header(USER_AGENT, COPILOT_USER_AGENT)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("scope", self.scope.as_str()),
            ])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(AuthError::ProviderUnavailable(format!(
                "Device code request failed with status {}",
                resp.status()
            )));
        }
        let payload: DeviceCodeResponse = resp.json().await?;
        let interval_secs = match payload.interval {
            Some(0) | None => DEFAULT_POLL_INTERVAL_SECS,
            Some(secs) => secs,
        };
        let expires_at = i64::try_from(payload.expires_in)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|lifetime| self.clock.now().checked_add_signed(lifetime))
            .ok_or_else(|| {
                AuthError::ProviderUnavailable(format!(
                    "Device code expires_in out of range: {}",
                    payload.expires_in
                ))
            })?;
        tracing::debug!(
            interval_secs,
            expires_at = %expires_at,
            "device code issued"
        );
        Ok(DeviceCodeSession {
            verification_url: payload.verification_uri,
            user_code: payload.user_code,
            device_code: payload.device_code,
            interval_secs,
            expires_at,
        })
    }

    async fn poll(&self, session: &DeviceCodeSession) -> Result<DeviceCodePoll, AuthError> {
        if self.clock.now() >= session.expires_at {
            return Ok(DeviceCodePoll::Expired);
        }
        let resp = self
            .client
            .post(&self.access_token_url)
            .header("Accept", "application/json")
            .header(USER_AGENT, COPILOT_USER_AGENT)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("device_code", session.device_code.as_str()),
                ("grant_type", DEVICE_GRANT_TYPE),
            ])
            .send()
            .await?;
        // Providers following RFC 8628 report pending/denied/expired as 400s.
        let status = resp.status();
        if !status.is_success() && !status.is_client_error() {
            return Err(AuthError::ProviderUnavailable(format!(
                "Device token request failed with status {status}"
            )));
        }
        let payload: DeviceTokenResponse = match resp.json().await {
            Ok(payload) => payload,
            Err(_) if status.is_client_error() => {
                return Err(AuthError::ProviderUnavailable(format!(
                    "Device token request failed with status {status}"
                )));
            }
            Err(err) => return Err(err.into()),
        };
        if let Some(access_token) = payload.access_token.filter(|t| !t.is_empty()) {
            return Ok(DeviceCodePoll::Authorized { access_token });
        }
        match payload.error.as_deref() {
            Some("authorization_pending") => Ok(DeviceCodePoll::Pending),
            Some("slow_down") => Ok(DeviceCodePoll::SlowDown {
                interval_secs: payload.interval,
            }),
            Some("expired_token") => Ok(DeviceCodePoll::Expired),
            Some("access_denied") => Ok(DeviceCodePoll::AccessDenied),
            Some(other) => Err(AuthError::ProviderUnavailable(format!(
                "Device code error: {other}{}",
                payload
                    .error_description
                    .map(|d| format!(" ({d})"))
                    .unwrap_or_default()
            ))),
            None => Err(AuthError::ProviderUnavailable(
                "Device code response missing token and error".to_string(),
            )),
        }
    }

    async fn account_identifier(&self, provider_token: &str) -> Result<Option<String>, AuthError> {
        let resp = self
            .client
            .get(&self.user_url)
            .header("Accept", "application/json")
            .header(USER_AGENT, COPILOT_USER_AGENT)
            .bearer_auth(provider_token)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(AuthError::ProviderUnavailable(format!(
                "User lookup failed with status {}",
                resp.status()
            )));
        }
        let payload: UserResponse = resp.json().await?;
        Ok(payload.login.filter(|login| !login.is_empty()))
    }
}

#[derive(Debug, Deserialize)]
struct DeviceCodeResponse {
    device_code: String,
    user_code: String,
    verification_uri: String,
    expires_in: u64,
    interval: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct DeviceTokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
    interval: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    login: Option<String>,
}
