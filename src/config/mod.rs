//! Configuration (layered: code > env > defaults).

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use bon::Builder;
use strum::{Display, EnumString};

use crate::util::retry::RetryPolicy;

pub const DEFAULT_CLIENT_ID: &str = "Iv1.b507a08c87ecfe98";
pub const DEFAULT_SCOPE: &str = "read:user";
pub const DEFAULT_DEVICE_CODE_URL: &str = "https://github.com/login/device/code";
pub const DEFAULT_ACCESS_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
pub const DEFAULT_SERVICE_TOKEN_URL: &str = "https://api.github.com/copilot_internal/v2/token";
pub const DEFAULT_USER_URL: &str = "https://api.github.com/user";
pub const DEFAULT_API_BASE_URL: &str = "https://api.individual.githubcopilot.com";
pub const DEFAULT_KEYRING_SERVICE: &str = "copilot-auth";
pub const DEFAULT_KEYRING_ACCOUNT: &str = "credentials";

/// Environment variable holding a pre-provisioned provider token.
pub const ENV_OVERRIDE_TOKEN: &str = "COPILOT_AUTH_TOKEN";
pub const ENV_STORE_BACKEND: &str = "COPILOT_AUTH_STORE";
pub const ENV_CREDENTIALS_PATH: &str = "COPILOT_AUTH_CREDENTIALS_PATH";
pub const ENV_CLIENT_ID: &str = "COPILOT_AUTH_CLIENT_ID";

/// Which credential backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum StoreBackend {
    /// Platform keyring when it responds, file otherwise.
    #[default]
    Auto,
    Keyring,
    File,
}

/// Settings for the authentication component.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use copilot_auth::config::{AuthConfig, StoreBackend};
///
/// let config = AuthConfig::builder()
///     .store_backend(StoreBackend::File)
///     .credentials_path("/tmp/copilot-auth/credentials.toml".into())
///     .safety_margin(Duration::from_secs(120))
///     .build();
/// assert_eq!(config.scope, "read:user");
/// ```
#[derive(Clone, Builder)]
pub struct AuthConfig {
    #[builder(into, default = DEFAULT_CLIENT_ID.to_string())]
    pub client_id: String,
    #[builder(into, default = DEFAULT_SCOPE.to_string())]
    pub scope: String,
    #[builder(into, default = DEFAULT_DEVICE_CODE_URL.to_string())]
    pub device_code_url: String,
    #[builder(into, default = DEFAULT_ACCESS_TOKEN_URL.to_string())]
    pub access_token_url: String,
    #[builder(into, default = DEFAULT_SERVICE_TOKEN_URL.to_string())]
    pub service_token_url: String,
    #[builder(into, default = DEFAULT_USER_URL.to_string())]
    pub user_url: String,
    /// Completion API base URL used when the service token names none.
    #[builder(into, default = DEFAULT_API_BASE_URL.to_string())]
    pub api_base_url: String,
    /// A service token must outlive `now + safety_margin` to be used.
    #[builder(default = Duration::from_secs(60))]
    pub safety_margin: Duration,
    /// Per-request HTTP timeout.
    #[builder(default = Duration::from_secs(30))]
    pub request_timeout: Duration,
    /// Added to the poll interval on every `slow_down` response.
    #[builder(default = Duration::from_secs(5))]
    pub slow_down_increment: Duration,
    /// Consecutive failed polls tolerated before the device flow gives up.
    #[builder(default = 3)]
    pub max_poll_failures: u32,
    /// Backoff applied to transient exchange failures.
    #[builder(default)]
    pub retry: RetryPolicy,
    #[builder(default)]
    pub store_backend: StoreBackend,
    #[builder(into, default = DEFAULT_KEYRING_SERVICE.to_string())]
    pub keyring_service: String,
    #[builder(into, default = DEFAULT_KEYRING_ACCOUNT.to_string())]
    pub keyring_account: String,
    #[builder(default = default_credentials_path())]
    pub credentials_path: PathBuf,
    /// Provider token supplied by the environment; skips the device flow.
    pub override_token: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("client_id", &self.client_id)
            .field("scope", &self.scope)
            .field("device_code_url", &self.device_code_url)
            .field("access_token_url", &self.access_token_url)
            .field("service_token_url", &self.service_token_url)
            .field("user_url", &self.user_url)
            .field("api_base_url", &self.api_base_url)
            .field("safety_margin", &self.safety_margin)
            .field("request_timeout", &self.request_timeout)
            .field("slow_down_increment", &self.slow_down_increment)
            .field("max_poll_failures", &self.max_poll_failures)
            .field("retry", &self.retry)
            .field("store_backend", &self.store_backend)
            .field("keyring_service", &self.keyring_service)
            .field("keyring_account", &self.keyring_account)
            .field("credentials_path", &self.credentials_path)
            .field("override_token", &self.override_token.as_ref().map(|_| ".."))
            .finish()
    }
}

impl AuthConfig {
    /// Defaults overlaid with environment variables (and `.env`, if present).
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(token) = lookup(ENV_OVERRIDE_TOKEN) {
            config.override_token = Some(token.trim().to_string());
        }
        if let Some(path) = lookup(ENV_CREDENTIALS_PATH) {
            config.credentials_path = PathBuf::from(path);
        }
        if let Some(client_id) = lookup(ENV_CLIENT_ID) {
            config.client_id = client_id;
        }
        if let Some(raw) = lookup(ENV_STORE_BACKEND) {
            match raw.trim().parse::<StoreBackend>() {
                Ok(backend) => config.store_backend = backend,
                Err(_) => tracing::warn!(
                    value = %raw,
                    "unknown {ENV_STORE_BACKEND} value, expected auto|keyring|file"
                ),
            }
        }
        config
    }

    /// Safety margin as a signed duration for timestamp arithmetic.
    pub fn margin(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.safety_margin).unwrap_or_else(|_| chrono::Duration::zero())
    }
}

/// Default credential file path (~/.copilot-auth/credentials.toml).
pub fn default_credentials_path() -> PathBuf {
    directories::UserDirs::new()
        .map(|dirs| dirs.home_dir().join(".copilot-auth"))
        .unwrap_or_else(|| PathBuf::from(".copilot-auth"))
        .join("credentials.toml")
}
