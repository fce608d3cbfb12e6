use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use super::clock::{Clock, SystemClock};
use super::credential::{redact, AuthState, CredentialRecord};
use super::device_code::DeviceCodePoll;
use super::device_flow::{DeviceFlow, GitHubDeviceFlow};
use super::error::AuthError;
use super::exchange::{CopilotTokenExchanger, ServiceToken, TokenExchange};
use super::http::copilot_headers;
use super::notify::{AuthNotifier, TerminalNotifier};
use super::store::{open_store, CredentialStore};
use crate::config::AuthConfig;

/// Owner of the credential lifecycle for one process.
///
/// Every token-affecting operation runs behind a single async mutex, so
/// concurrent callers never start two device flows or race two exchanges:
/// a caller that arrives while another holds the lock waits and then sees
/// the record the first caller left behind. Local status checks read a
/// published copy of the record instead and never wait on that lock.
///
/// Lifecycle: `Unauthenticated` → device flow → `HasProviderToken` →
/// exchange → `HasServiceToken` → expiry → `HasProviderToken` → … A rejected
/// exchange drops the record and returns to `Unauthenticated`.
///
/// # Example
/// ```no_run
/// use copilot_auth::auth::SessionManager;
/// use copilot_auth::config::AuthConfig;
///
/// # async fn example() -> Result<(), copilot_auth::auth::AuthError> {
/// let session = SessionManager::from_config(AuthConfig::from_env())?;
/// if session.authenticate(false).await {
///     let token = session.get_token().await?;
///     println!("{} chars", token.len());
/// }
/// # Ok(())
/// # }
/// ```
pub struct SessionManager {
    config: AuthConfig,
    store: Arc<dyn CredentialStore>,
    device_flow: Arc<dyn DeviceFlow>,
    exchanger: Arc<dyn TokenExchange>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn AuthNotifier>,
    cancel: CancellationToken,
    cache: Mutex<RecordCache>,
    /// Last record written under `cache`, readable while a login holds the lock.
    published: RwLock<RecordCache>,
}

#[derive(Clone, Default)]
struct RecordCache {
    loaded: bool,
    record: Option<CredentialRecord>,
}

impl SessionManager {
    pub fn new(
        config: AuthConfig,
        store: Arc<dyn CredentialStore>,
        device_flow: Arc<dyn DeviceFlow>,
        exchanger: Arc<dyn TokenExchange>,
    ) -> Self {
        Self {
            config,
            store,
            device_flow,
            exchanger,
            clock: Arc::new(SystemClock),
            notifier: Arc::new(TerminalNotifier),
            cancel: CancellationToken::new(),
            cache: Mutex::new(RecordCache::default()),
            published: RwLock::new(RecordCache::default()),
        }
    }

    /// Wire the production store, GitHub device flow and Copilot exchanger.
    pub fn from_config(config: AuthConfig) -> Result<Self, AuthError> {
        let store = open_store(&config);
        let device_flow = Arc::new(GitHubDeviceFlow::new(&config)?);
        let exchanger = Arc::new(CopilotTokenExchanger::new(&config)?);
        Ok(Self::new(config, store, device_flow, exchanger))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn AuthNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Cancelling `token` aborts an in-progress device-flow wait.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Make sure a usable service token is on file.
    ///
    /// Returns `false` on any terminal failure after reporting it through the
    /// notifier; use [`SessionManager::try_authenticate`] to get the error.
    pub async fn authenticate(&self, force_refresh: bool) -> bool {
        match self.try_authenticate(force_refresh).await {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(error = %err, "authentication failed");
                self.notifier.failed(&err);
                false
            }
        }
    }

    pub async fn try_authenticate(&self, force_refresh: bool) -> Result<(), AuthError> {
        let mut cache = self.cache.lock().await;
        let cached = self.current(&mut cache);

        if !force_refresh {
            if let Some(record) = &cached {
                if record
                    .usable_service_token(self.clock.now(), self.config.margin())
                    .is_some()
                {
                    tracing::debug!("cached service token still valid");
                    return Ok(());
                }
            }
        }

        if let Some(record) = cached {
            match self.exchange(&record.provider_access_token).await {
                Ok(service) => {
                    self.commit(&mut cache, merge(record, service));
                    return Ok(());
                }
                Err(AuthError::ExchangeRejected(reason)) if self.config.override_token.is_none() => {
                    tracing::warn!(%reason, "stored provider token rejected, restarting device flow");
                    self.forget(&mut cache);
                }
                Err(err) => return Err(err),
            }
        }

        let provider_token = self.run_device_flow().await?;
        let account = match self.device_flow.account_identifier(&provider_token).await {
            Ok(account) => account,
            Err(err) => {
                tracing::debug!(error = %err, "account lookup failed");
                None
            }
        };
        let record = CredentialRecord::new(provider_token).with_account(account);

        match self.exchange(&record.provider_access_token).await {
            Ok(service) => {
                self.notifier.authorized(record.account_identifier.as_deref());
                self.commit(&mut cache, merge(record, service));
                Ok(())
            }
            Err(err) => {
                // The device flow itself succeeded; keep its token so a later
                // attempt can go straight to the exchange.
                self.commit(&mut cache, record);
                Err(err)
            }
        }
    }

    /// Cheap local check: no network, no exchange, no waiting on a login
    /// in progress.
    pub async fn is_authenticated(&self) -> bool {
        match self.peek() {
            Some(record) => {
                record
                    .usable_service_token(self.clock.now(), self.config.margin())
                    .is_some()
                    || !record.provider_access_token.trim().is_empty()
            }
            None => false,
        }
    }

    pub async fn state(&self) -> AuthState {
        match self.peek() {
            Some(record) => record.state(self.clock.now(), self.config.margin()),
            None => AuthState::Unauthenticated,
        }
    }

    /// The cached record, if any. Secrets stay inside; `Debug` redacts them.
    pub async fn record(&self) -> Option<CredentialRecord> {
        let mut cache = self.cache.lock().await;
        self.current(&mut cache)
    }

    /// Return a valid service token, exchanging the provider token if needed.
    pub async fn get_token(&self) -> Result<String, AuthError> {
        let mut cache = self.cache.lock().await;
        let record = self.current(&mut cache).ok_or(AuthError::NotAuthenticated)?;
        if let Some(token) = record.usable_service_token(self.clock.now(), self.config.margin()) {
            return Ok(token.to_string());
        }

        match self.exchange(&record.provider_access_token).await {
            Ok(service) => {
                let token = service.token.clone();
                self.commit(&mut cache, merge(record, service));
                Ok(token)
            }
            Err(AuthError::ExchangeRejected(reason)) if self.config.override_token.is_none() => {
                tracing::warn!(%reason, "provider token rejected, credentials cleared");
                self.forget(&mut cache);
                Err(AuthError::NotAuthenticated)
            }
            Err(err) => Err(err),
        }
    }

    /// Attach the service bearer token and editor headers to a request.
    pub async fn authorize(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder, AuthError> {
        let token = self.get_token().await?;
        Ok(request.headers(copilot_headers()).bearer_auth(token))
    }

    /// Completion API base URL, preferring the one the service token names.
    pub async fn api_base_url(&self) -> String {
        let mut cache = self.cache.lock().await;
        self.current(&mut cache)
            .and_then(|record| record.api_endpoint)
            .unwrap_or_else(|| self.config.api_base_url.clone())
    }

    /// Delete stored credentials. Safe to call when none exist.
    pub async fn logout(&self) -> Result<(), AuthError> {
        let mut cache = self.cache.lock().await;
        cache.record = None;
        cache.loaded = false;
        self.publish(&cache);
        self.store.delete()?;
        tracing::info!(backend = self.store.name(), "credentials removed");
        Ok(())
    }

    fn current(&self, cache: &mut RecordCache) -> Option<CredentialRecord> {
        if !cache.loaded {
            cache.record = self.load_initial();
            cache.loaded = true;
            self.publish(cache);
        }
        cache.record.clone()
    }

    /// Published record, or a direct store read before anything was loaded.
    fn peek(&self) -> Option<CredentialRecord> {
        let published = self
            .published
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if published.loaded {
            published.record
        } else {
            self.load_initial()
        }
    }

    fn publish(&self, cache: &RecordCache) {
        *self
            .published
            .write()
            .unwrap_or_else(PoisonError::into_inner) = cache.clone();
    }

    fn load_initial(&self) -> Option<CredentialRecord> {
        if let Some(token) = &self.config.override_token {
            tracing::debug!(token = %redact(token), "using provider token from environment");
            return Some(CredentialRecord::new(token.clone()));
        }
        match self.store.load() {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!(backend = self.store.name(), error = %err, "could not read credentials");
                None
            }
        }
    }

    fn commit(&self, cache: &mut RecordCache, record: CredentialRecord) {
        if self.config.override_token.is_none() {
            if let Err(err) = self.store.save(&record) {
                tracing::warn!(backend = self.store.name(), error = %err, "could not persist credentials");
            }
        }
        cache.record = Some(record);
        cache.loaded = true;
        self.publish(cache);
    }

    fn forget(&self, cache: &mut RecordCache) {
        if let Err(err) = self.store.delete() {
            tracing::warn!(backend = self.store.name(), error = %err, "could not delete credentials");
        }
        cache.record = None;
        cache.loaded = true;
        self.publish(cache);
    }

    async fn exchange(&self, provider_token: &str) -> Result<ServiceToken, AuthError> {
        self.config
            .retry
            .execute(self.clock.as_ref(), || self.exchanger.exchange(provider_token))
            .await
    }

    async fn run_device_flow(&self) -> Result<String, AuthError> {
        let session = self.device_flow.start().await?;
        self.notifier.device_code(&session);

        let mut interval = Duration::from_secs(session.interval_secs);
        let mut failures = 0;
        loop {
            if self.clock.now() >= session.expires_at {
                return Err(AuthError::ExpiredSession);
            }
            match self.device_flow.poll(&session).await {
                Ok(DeviceCodePoll::Authorized { access_token }) => {
                    tracing::info!("device authorization completed");
                    return Ok(access_token);
                }
                Ok(DeviceCodePoll::Pending) => failures = 0,
                Ok(DeviceCodePoll::SlowDown { interval_secs }) => {
                    failures = 0;
                    let bumped = interval + self.config.slow_down_increment;
                    interval = interval_secs
                        .map(Duration::from_secs)
                        .map_or(bumped, |requested| requested.max(bumped));
                    tracing::debug!(interval_secs = interval.as_secs(), "provider asked to slow down");
                }
                Ok(DeviceCodePoll::AccessDenied) => return Err(AuthError::AuthorizationDenied),
                Ok(DeviceCodePoll::Expired) => return Err(AuthError::ExpiredSession),
                Err(err) if err.is_retryable() => {
                    failures += 1;
                    if failures >= self.config.max_poll_failures {
                        return Err(err);
                    }
                    tracing::warn!(attempt = failures, error = %err, "device poll failed");
                }
                Err(err) => return Err(err),
            }
            self.wait(interval).await?;
        }
    }

    async fn wait(&self, interval: Duration) -> Result<(), AuthError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(AuthError::Cancelled),
            _ = self.clock.sleep(interval) => Ok(()),
        }
    }
}

fn merge(mut record: CredentialRecord, service: ServiceToken) -> CredentialRecord {
    record.set_service_token(service.token, service.expires_at);
    record.api_endpoint = service.api_endpoint;
    record
}
