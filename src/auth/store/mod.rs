//! Durable storage for the credential record.

mod file;
mod secure;

pub use file::FileCredentialStore;
pub use secure::KeyringCredentialStore;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::credential::CredentialRecord;
use super::error::AuthError;
use crate::config::{AuthConfig, StoreBackend};

/// Storage abstraction for the single persisted credential record.
pub trait CredentialStore: Send + Sync {
    /// Backend label for diagnostics.
    fn name(&self) -> &str;
    /// Returns `None` when no record exists or the stored one is unreadable.
    fn load(&self) -> Result<Option<CredentialRecord>, AuthError>;
    fn save(&self, record: &CredentialRecord) -> Result<(), AuthError>;
    /// Removes the record; succeeds when nothing is stored.
    fn delete(&self) -> Result<(), AuthError>;
}

/// Secure store with a transparent file fallback.
///
/// The first failure of the primary backend switches the store to the
/// fallback for the rest of the process. Loads consult the fallback whenever
/// the primary has nothing, so a record written during an earlier outage is
/// still found. A write that lands in the fallback removes the primary copy,
/// so at most one backend holds the current record.
pub struct FallbackCredentialStore {
    primary: Arc<dyn CredentialStore>,
    fallback: Arc<dyn CredentialStore>,
    degraded: AtomicBool,
}

impl FallbackCredentialStore {
    pub fn new(primary: Arc<dyn CredentialStore>, fallback: Arc<dyn CredentialStore>) -> Self {
        Self {
            primary,
            fallback,
            degraded: AtomicBool::new(false),
        }
    }

    /// True once the primary backend has failed and writes go to the fallback.
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    fn degrade(&self, operation: &str, error: &AuthError) {
        if !self.degraded.swap(true, Ordering::SeqCst) {
            tracing::warn!(
                backend = self.primary.name(),
                fallback = self.fallback.name(),
                operation,
                error = %error,
                "secure credential store unavailable, using fallback"
            );
        }
    }
}

impl CredentialStore for FallbackCredentialStore {
    fn name(&self) -> &str {
        if self.is_degraded() {
            self.fallback.name()
        } else {
            self.primary.name()
        }
    }

    fn load(&self) -> Result<Option<CredentialRecord>, AuthError> {
        if !self.is_degraded() {
            match self.primary.load() {
                Ok(Some(record)) => return Ok(Some(record)),
                Ok(None) => {}
                Err(err) => self.degrade("load", &err),
            }
        }
        self.fallback.load()
    }

    fn save(&self, record: &CredentialRecord) -> Result<(), AuthError> {
        if !self.is_degraded() {
            match self.primary.save(record) {
                Ok(()) => {
                    if let Err(err) = self.fallback.delete() {
                        tracing::debug!(error = %err, "could not remove stale fallback record");
                    }
                    return Ok(());
                }
                Err(err) => self.degrade("save", &err),
            }
        }
        self.fallback.save(record)?;
        // An older copy left in the primary would shadow this one on the next load.
        if let Err(err) = self.primary.delete() {
            tracing::debug!(error = %err, "could not remove stale primary record");
        }
        Ok(())
    }

    fn delete(&self) -> Result<(), AuthError> {
        if let Err(err) = self.primary.delete() {
            self.degrade("delete", &err);
        }
        self.fallback.delete()
    }
}

/// Builds the credential store selected by configuration.
///
/// `Auto` probes the platform keyring once and settles on the file store when
/// it does not respond; an explicit `Keyring` still keeps the file fallback.
pub fn open_store(config: &AuthConfig) -> Arc<dyn CredentialStore> {
    let file: Arc<dyn CredentialStore> =
        Arc::new(FileCredentialStore::new(config.credentials_path.clone()));
    let keyring = KeyringCredentialStore::new(&config.keyring_service, &config.keyring_account);
    match config.store_backend {
        StoreBackend::File => file,
        StoreBackend::Keyring => Arc::new(FallbackCredentialStore::new(Arc::new(keyring), file)),
        StoreBackend::Auto => {
            if keyring.probe() {
                Arc::new(FallbackCredentialStore::new(Arc::new(keyring), file))
            } else {
                tracing::warn!(
                    path = %config.credentials_path.display(),
                    "platform keyring unavailable, storing credentials in file"
                );
                file
            }
        }
    }
}
