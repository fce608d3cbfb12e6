//! OS-native secure storage (Keychain, Credential Manager, kernel keyring).

use super::CredentialStore;
use crate::auth::credential::CredentialRecord;
use crate::auth::error::AuthError;

/// Stores the credential record as a TOML document in the platform keyring.
#[derive(Debug, Clone)]
pub struct KeyringCredentialStore {
    service: String,
    account: String,
}

impl KeyringCredentialStore {
    pub fn new(service: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            account: account.into(),
        }
    }

    /// Whether the platform keyring answers at all.
    ///
    /// A missing entry still counts as available.
    pub fn probe(&self) -> bool {
        match self.entry().and_then(|entry| entry.get_password()) {
            Ok(_) | Err(keyring::Error::NoEntry) => true,
            Err(err) => {
                tracing::debug!(error = %err, "keyring probe failed");
                false
            }
        }
    }

    fn entry(&self) -> Result<keyring::Entry, keyring::Error> {
        keyring::Entry::new(&self.service, &self.account)
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn name(&self) -> &str {
        "keyring"
    }

    fn load(&self) -> Result<Option<CredentialRecord>, AuthError> {
        let raw = match self.entry()?.get_password() {
            Ok(raw) => raw,
            Err(keyring::Error::NoEntry) => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        match toml::from_str::<CredentialRecord>(&raw) {
            Ok(record) if record.is_valid() => Ok(Some(record)),
            Ok(_) => {
                tracing::warn!(service = %self.service, "ignoring keyring record with inconsistent fields");
                Ok(None)
            }
            Err(err) => {
                tracing::warn!(service = %self.service, error = %err, "ignoring corrupt keyring record");
                Ok(None)
            }
        }
    }

    fn save(&self, record: &CredentialRecord) -> Result<(), AuthError> {
        if !record.is_valid() {
            return Err(AuthError::Serialization(
                "refusing to persist an inconsistent credential record".to_string(),
            ));
        }
        let serialized = toml::to_string(record)?;
        self.entry()?.set_password(&serialized)?;
        Ok(())
    }

    fn delete(&self) -> Result<(), AuthError> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
