//! Conversion of the provider token into a short-lived service token.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;

use super::credential::redact;
use super::error::AuthError;
use super::http::{build_client, copilot_headers};
use crate::config::AuthConfig;

/// Service credential returned by a successful exchange.
#[derive(Clone, PartialEq, Eq)]
pub struct ServiceToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    /// API base URL advertised inside the token, when present.
    pub api_endpoint: Option<String>,
}

impl std::fmt::Debug for ServiceToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceToken")
            .field("token", &redact(&self.token))
            .field("expires_at", &self.expires_at)
            .field("api_endpoint", &self.api_endpoint)
            .finish()
    }
}

/// Exchanges a provider access token for a service token.
///
/// Implementations make one attempt per call and report revoked or invalid
/// provider tokens as [`AuthError::ExchangeRejected`].
#[async_trait]
pub trait TokenExchange: Send + Sync {
    async fn exchange(&self, provider_token: &str) -> Result<ServiceToken, AuthError>;
}

/// Copilot token endpoint client.
///
/// # Example
/// ```no_run
/// use copilot_auth::auth::{CopilotTokenExchanger, TokenExchange};
/// use copilot_auth::config::AuthConfig;
///
/// # async fn example() -> Result<(), copilot_auth::auth::AuthError> {
/// let exchanger = CopilotTokenExchanger::new(&AuthConfig::default())?;
/// let service = exchanger.exchange("gho_provider_token").await?;
/// println!("valid until {}", service.expires_at);
/// # Ok(())
/// # }
/// ```
pub struct CopilotTokenExchanger {
    client: reqwest::Client,
    service_token_url: String,
}

impl CopilotTokenExchanger {
    pub fn new(config: &AuthConfig) -> Result<Self, AuthError> {
        Ok(Self {
            client: build_client(config.request_timeout)?,
            service_token_url: config.service_token_url.clone(),
        })
    }
}

#[async_trait]
impl TokenExchange for CopilotTokenExchanger {
    async fn exchange(&self, provider_token: &str) -> Result<ServiceToken, AuthError> {
        let resp = self
            .client
            .get(&self.service_token_url)
            .headers(copilot_headers())
            .bearer_auth(provider_token)
            .send()
            .await?;
        if let Some(error) = classify_exchange_status(resp.status()) {
            return Err(error);
        }
        let payload: ServiceTokenResponse = resp.json().await?;
        if payload.token.trim().is_empty() {
            return Err(AuthError::ProviderUnavailable(
                "Service token response carried an empty token".to_string(),
            ));
        }
        let expires_at = parse_expires_at(payload.expires_at)?;
        let api_endpoint = payload
            .endpoints
            .and_then(|endpoints| endpoints.api)
            .or_else(|| derive_api_endpoint(&payload.token));
        tracing::debug!(
            token = %redact(&payload.token),
            expires_at = %expires_at,
            "service token issued"
        );
        Ok(ServiceToken {
            token: payload.token,
            expires_at,
            api_endpoint,
        })
    }
}

/// Maps a token-endpoint status to the error taxonomy.
///
/// Every status-dependent decision about the exchange lives here so the
/// mapping can be corrected without touching the session state machine.
pub fn classify_exchange_status(status: StatusCode) -> Option<AuthError> {
    if status.is_success() {
        return None;
    }
    let error = match status {
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            AuthError::ProviderUnavailable(format!("Service token exchange throttled ({status})"))
        }
        s if s.is_server_error() => {
            AuthError::ProviderUnavailable(format!("Service token exchange failed with status {s}"))
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => {
            AuthError::ExchangeRejected(format!("provider token refused ({status})"))
        }
        s if s.is_client_error() => {
            AuthError::ExchangeRejected(format!("Service token exchange failed with status {s}"))
        }
        s => AuthError::ProviderUnavailable(format!("Unexpected exchange status {s}")),
    };
    Some(error)
}

#[derive(Debug, Deserialize)]
struct ServiceTokenResponse {
    token: String,
    expires_at: serde_json::Value,
    #[serde(default)]
    endpoints: Option<ServiceEndpoints>,
}

#[derive(Debug, Deserialize)]
struct ServiceEndpoints {
    api: Option<String>,
}

/// Accepts seconds or milliseconds since the epoch, as a number or string.
fn parse_expires_at(value: serde_json::Value) -> Result<DateTime<Utc>, AuthError> {
    let raw = match &value {
        serde_json::Value::Number(num) => num.as_i64(),
        serde_json::Value::String(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    }
    .ok_or_else(|| {
        AuthError::ProviderUnavailable("Service token expires_at missing or invalid".to_string())
    })?;
    let secs = if raw > 10_000_000_000 { raw / 1000 } else { raw };
    DateTime::<Utc>::from_timestamp(secs, 0).ok_or_else(|| {
        AuthError::ProviderUnavailable("Service token expires_at out of range".to_string())
    })
}

fn derive_api_endpoint(token: &str) -> Option<String> {
    let proxy = token.split(';').find_map(|part| {
        let part = part.trim();
        if part.to_ascii_lowercase().starts_with("proxy-ep=") {
            Some(part["proxy-ep=".len()..].trim().to_string())
        } else {
            None
        }
    })?;
    let host = proxy
        .replace("https://", "")
        .replace("http://", "")
        .replacen("proxy.", "api.", 1);
    if host.is_empty() {
        return None;
    }
    Some(format!("https://{host}"))
}
