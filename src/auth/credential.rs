use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Persisted credential material for one user.
///
/// A record always holds a non-empty provider token. The service token and
/// its expiry travel together: [`CredentialRecord::set_service_token`] is the
/// only way to install one.
///
/// # Example
/// ```
/// use chrono::{Duration, Utc};
/// use copilot_auth::auth::CredentialRecord;
///
/// let mut record = CredentialRecord::new("gho_provider");
/// record.set_service_token("svc", Utc::now() + Duration::minutes(30));
/// assert!(record.is_valid());
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub provider_access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_access_token: Option<String>,
    /// Seconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_token_expiry: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_identifier: Option<String>,
    /// API base URL advertised by the service token, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_endpoint: Option<String>,
}

/// Lifecycle position of a credential record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum AuthState {
    Unauthenticated,
    HasProviderToken,
    HasServiceToken,
}

impl CredentialRecord {
    pub fn new(provider_access_token: impl Into<String>) -> Self {
        Self {
            provider_access_token: provider_access_token.into(),
            service_access_token: None,
            service_token_expiry: None,
            account_identifier: None,
            api_endpoint: None,
        }
    }

    pub fn with_account(mut self, account: Option<String>) -> Self {
        self.account_identifier = account;
        self
    }

    pub fn set_service_token(&mut self, token: impl Into<String>, expires_at: DateTime<Utc>) {
        self.service_access_token = Some(token.into());
        self.service_token_expiry = Some(expires_at.timestamp());
    }

    pub fn service_expiry(&self) -> Option<DateTime<Utc>> {
        self.service_token_expiry
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
    }

    /// Returns the service token when it outlives `now + margin`.
    ///
    /// A token expiring exactly at the margin boundary counts as expired.
    pub fn usable_service_token(&self, now: DateTime<Utc>, margin: Duration) -> Option<&str> {
        let token = self.service_access_token.as_deref()?;
        let expiry = self.service_expiry()?;
        (expiry > now + margin).then_some(token)
    }

    pub fn state(&self, now: DateTime<Utc>, margin: Duration) -> AuthState {
        if self.usable_service_token(now, margin).is_some() {
            AuthState::HasServiceToken
        } else {
            AuthState::HasProviderToken
        }
    }

    /// Checks the record invariants before it is persisted or trusted.
    pub fn is_valid(&self) -> bool {
        if self.provider_access_token.trim().is_empty() {
            return false;
        }
        match (&self.service_access_token, self.service_token_expiry) {
            (Some(token), Some(_)) => !token.is_empty(),
            (Some(_), None) => false,
            (None, _) => true,
        }
    }
}

impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("provider_access_token", &redact(&self.provider_access_token))
            .field(
                "service_access_token",
                &self.service_access_token.as_deref().map(redact),
            )
            .field("service_token_expiry", &self.service_token_expiry)
            .field("account_identifier", &self.account_identifier)
            .field("api_endpoint", &self.api_endpoint)
            .finish()
    }
}

/// Short preview of a secret for diagnostics.
pub fn redact(secret: &str) -> String {
    let preview: String = secret.chars().take(4).collect();
    format!("{preview}… ({} chars)", secret.chars().count())
}
