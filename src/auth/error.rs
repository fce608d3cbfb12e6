use thiserror::Error;

/// Authentication failures surfaced by the session manager and its collaborators.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Identity provider unavailable: {0}")]
    ProviderUnavailable(String),
    #[error("Device code expired before authorization completed")]
    ExpiredSession,
    #[error("Authorization denied")]
    AuthorizationDenied,
    #[error("Token exchange rejected: {0}")]
    ExchangeRejected(String),
    #[error("Credential store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("Not authenticated")]
    NotAuthenticated,
    #[error("Authentication cancelled")]
    Cancelled,
    #[error("IO error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// What the user should do after a failed authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Transient failure; trying again later is expected to work.
    Retry,
    /// The device flow must be restarted from the beginning.
    Reauthenticate,
    /// The account authorized but is not entitled to the service.
    CheckSubscription,
    /// Local credential storage is misbehaving.
    CheckStorage,
    None,
}

impl Recovery {
    pub fn message(self) -> &'static str {
        match self {
            Self::Retry => "The service could not be reached. Please retry in a moment.",
            Self::Reauthenticate => "Please re-run authentication to get a new device code.",
            Self::CheckSubscription => {
                "Your account was authorized but the service refused it. \
                 Check your subscription or contact support."
            }
            Self::CheckStorage => "Credentials could not be stored. Check file permissions.",
            Self::None => "",
        }
    }
}

impl AuthError {
    /// Whether retrying the same request can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ProviderUnavailable(_))
    }

    pub fn recovery(&self) -> Recovery {
        match self {
            Self::ProviderUnavailable(_) => Recovery::Retry,
            Self::ExpiredSession | Self::AuthorizationDenied | Self::NotAuthenticated => {
                Recovery::Reauthenticate
            }
            Self::ExchangeRejected(_) => Recovery::CheckSubscription,
            Self::StoreUnavailable(_) | Self::Io(_) | Self::Serialization(_) => {
                Recovery::CheckStorage
            }
            Self::Cancelled | Self::Configuration(_) => Recovery::None,
        }
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(error: reqwest::Error) -> Self {
        Self::ProviderUnavailable(error.to_string())
    }
}

impl From<std::io::Error> for AuthError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<toml::de::Error> for AuthError {
    fn from(error: toml::de::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<toml::ser::Error> for AuthError {
    fn from(error: toml::ser::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<keyring::Error> for AuthError {
    fn from(error: keyring::Error) -> Self {
        Self::StoreUnavailable(error.to_string())
    }
}
