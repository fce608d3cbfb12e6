use chrono::{DateTime, Utc};

/// Device-code session details returned by the identity provider.
///
/// Sessions are transient: they are never persisted and never reused across
/// authentication attempts.
///
/// # Example
/// ```no_run
/// use copilot_auth::auth::DeviceCodeSession;
/// use chrono::{Duration, Utc};
///
/// let session = DeviceCodeSession {
///     verification_url: "https://github.com/login/device".to_string(),
///     user_code: "ABCD-EFGH".to_string(),
///     device_code: "device-code".to_string(),
///     interval_secs: 5,
///     expires_at: Utc::now() + Duration::minutes(15),
/// };
/// ```
#[derive(Clone)]
pub struct DeviceCodeSession {
    pub verification_url: String,
    pub user_code: String,
    pub device_code: String,
    pub interval_secs: u64,
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for DeviceCodeSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceCodeSession")
            .field("verification_url", &self.verification_url)
            .field("user_code", &self.user_code)
            .field("device_code", &super::credential::redact(&self.device_code))
            .field("interval_secs", &self.interval_secs)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Outcome of a single poll against the token endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCodePoll {
    Pending,
    /// The provider asked for more spacing; it may name the interval it wants.
    SlowDown { interval_secs: Option<u64> },
    Authorized { access_token: String },
    AccessDenied,
    Expired,
}
