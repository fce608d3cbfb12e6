#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use copilot_auth::auth::{
    AuthError, AuthNotifier, Clock, CredentialRecord, CredentialStore, DeviceCodePoll,
    DeviceCodeSession, DeviceFlow, ServiceToken, SessionManager, TokenExchange,
};
use copilot_auth::config::{AuthConfig, StoreBackend};

pub const START: i64 = 1_700_000_000;

pub fn start_time() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(START, 0).expect("valid timestamp")
}

/// Virtual clock: `sleep` returns immediately and advances `now`.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::at(start_time())
    }

    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().expect("clock lock poisoned").clone()
    }

    pub fn advance(&self, duration: Duration) {
        let mut now = self.now.lock().expect("clock lock poisoned");
        *now += chrono::Duration::from_std(duration).expect("duration in range");
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock lock poisoned")
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps
            .lock()
            .expect("clock lock poisoned")
            .push(duration);
        self.advance(duration);
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    record: Mutex<Option<CredentialRecord>>,
    saves: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seeded(record: CredentialRecord) -> Self {
        let store = Self::default();
        *store.record.lock().expect("store lock poisoned") = Some(record);
        store
    }

    pub fn get(&self) -> Option<CredentialRecord> {
        self.record.lock().expect("store lock poisoned").clone()
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl CredentialStore for InMemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn load(&self) -> Result<Option<CredentialRecord>, AuthError> {
        Ok(self.get())
    }

    fn save(&self, record: &CredentialRecord) -> Result<(), AuthError> {
        assert!(record.is_valid(), "attempted to persist {record:?}");
        self.saves.fetch_add(1, Ordering::SeqCst);
        *self.record.lock().expect("store lock poisoned") = Some(record.clone());
        Ok(())
    }

    fn delete(&self) -> Result<(), AuthError> {
        *self.record.lock().expect("store lock poisoned") = None;
        Ok(())
    }
}

/// Secure-store stand-in that fails every operation.
pub struct FailingStore;

impl CredentialStore for FailingStore {
    fn name(&self) -> &str {
        "failing"
    }

    fn load(&self) -> Result<Option<CredentialRecord>, AuthError> {
        Err(AuthError::StoreUnavailable("keyring locked".to_string()))
    }

    fn save(&self, _record: &CredentialRecord) -> Result<(), AuthError> {
        Err(AuthError::StoreUnavailable("keyring locked".to_string()))
    }

    fn delete(&self) -> Result<(), AuthError> {
        Err(AuthError::StoreUnavailable("keyring locked".to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    DeviceCode { url: String, user_code: String },
    Authorized(Option<String>),
    Failed(String),
}

#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
    recoveries: Mutex<Vec<copilot_auth::auth::Recovery>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().expect("notifier lock poisoned").clone()
    }

    pub fn recoveries(&self) -> Vec<copilot_auth::auth::Recovery> {
        self.recoveries.lock().expect("notifier lock poisoned").clone()
    }
}

impl AuthNotifier for RecordingNotifier {
    fn device_code(&self, session: &DeviceCodeSession) {
        self.notices
            .lock()
            .expect("notifier lock poisoned")
            .push(Notice::DeviceCode {
                url: session.verification_url.clone(),
                user_code: session.user_code.clone(),
            });
    }

    fn authorized(&self, account: Option<&str>) {
        self.notices
            .lock()
            .expect("notifier lock poisoned")
            .push(Notice::Authorized(account.map(ToString::to_string)));
    }

    fn failed(&self, error: &AuthError) {
        self.recoveries
            .lock()
            .expect("notifier lock poisoned")
            .push(error.recovery());
        self.notices
            .lock()
            .expect("notifier lock poisoned")
            .push(Notice::Failed(error.to_string()));
    }
}

/// Device flow that replays scripted poll outcomes, then reports `Pending`.
pub struct ScriptedDeviceFlow {
    clock: Arc<ManualClock>,
    interval_secs: u64,
    expires_in_secs: i64,
    polls: Mutex<VecDeque<Result<DeviceCodePoll, AuthError>>>,
    starts: AtomicUsize,
    poll_count: AtomicUsize,
    account: Option<String>,
}

impl ScriptedDeviceFlow {
    pub fn new(clock: Arc<ManualClock>, polls: Vec<Result<DeviceCodePoll, AuthError>>) -> Self {
        Self {
            clock,
            interval_secs: 5,
            expires_in_secs: 900,
            polls: Mutex::new(polls.into()),
            starts: AtomicUsize::new(0),
            poll_count: AtomicUsize::new(0),
            account: None,
        }
    }

    pub fn with_expiry(mut self, expires_in_secs: i64) -> Self {
        self.expires_in_secs = expires_in_secs;
        self
    }

    pub fn with_account(mut self, account: &str) -> Self {
        self.account = Some(account.to_string());
        self
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn polls(&self) -> usize {
        self.poll_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeviceFlow for ScriptedDeviceFlow {
    async fn start(&self) -> Result<DeviceCodeSession, AuthError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(DeviceCodeSession {
            verification_url: "https://github.com/login/device".to_string(),
            user_code: "ABCD-EFGH".to_string(),
            device_code: "device-code-1".to_string(),
            interval_secs: self.interval_secs,
            expires_at: self.clock.now() + chrono::Duration::seconds(self.expires_in_secs),
        })
    }

    async fn poll(&self, _session: &DeviceCodeSession) -> Result<DeviceCodePoll, AuthError> {
        self.poll_count.fetch_add(1, Ordering::SeqCst);
        self.polls
            .lock()
            .expect("script lock poisoned")
            .pop_front()
            .unwrap_or(Ok(DeviceCodePoll::Pending))
    }

    async fn account_identifier(&self, _provider_token: &str) -> Result<Option<String>, AuthError> {
        Ok(self.account.clone())
    }
}

/// Exchanger that replays scripted outcomes and records the tokens it saw.
pub struct ScriptedExchanger {
    results: Mutex<VecDeque<Result<ServiceToken, AuthError>>>,
    seen: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl ScriptedExchanger {
    pub fn new(results: Vec<Result<ServiceToken, AuthError>>) -> Self {
        Self {
            results: Mutex::new(results.into()),
            seen: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Hold each exchange open for `delay` of real time.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().expect("script lock poisoned").len()
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().expect("script lock poisoned").clone()
    }
}

#[async_trait]
impl TokenExchange for ScriptedExchanger {
    async fn exchange(&self, provider_token: &str) -> Result<ServiceToken, AuthError> {
        self.seen
            .lock()
            .expect("script lock poisoned")
            .push(provider_token.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.results
            .lock()
            .expect("script lock poisoned")
            .pop_front()
            .unwrap_or_else(|| Err(AuthError::ProviderUnavailable("script exhausted".to_string())))
    }
}

pub fn service_token(token: &str, expires_in_secs: i64) -> ServiceToken {
    ServiceToken {
        token: token.to_string(),
        expires_at: start_time() + chrono::Duration::seconds(expires_in_secs),
        api_endpoint: None,
    }
}

pub fn provider_only(token: &str) -> CredentialRecord {
    CredentialRecord::new(token)
}

pub fn with_service(provider: &str, service: &str, expires_in_secs: i64) -> CredentialRecord {
    let mut record = CredentialRecord::new(provider);
    record.set_service_token(service, start_time() + chrono::Duration::seconds(expires_in_secs));
    record
}

pub fn test_config() -> AuthConfig {
    AuthConfig::builder()
        .store_backend(StoreBackend::File)
        .credentials_path("/nonexistent/copilot-auth/credentials.toml".into())
        .build()
}

/// Everything a session-manager test needs to inspect afterwards.
pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub store: Arc<InMemoryStore>,
    pub device_flow: Arc<ScriptedDeviceFlow>,
    pub exchanger: Arc<ScriptedExchanger>,
    pub notifier: Arc<RecordingNotifier>,
    pub session: SessionManager,
}

impl Harness {
    pub fn new(
        config: AuthConfig,
        store: InMemoryStore,
        polls: Vec<Result<DeviceCodePoll, AuthError>>,
        exchanges: Vec<Result<ServiceToken, AuthError>>,
    ) -> Self {
        let clock = Arc::new(ManualClock::new());
        let device_flow = Arc::new(ScriptedDeviceFlow::new(clock.clone(), polls));
        Self::with_parts(config, store, device_flow, ScriptedExchanger::new(exchanges), clock)
    }

    pub fn with_parts(
        config: AuthConfig,
        store: InMemoryStore,
        device_flow: Arc<ScriptedDeviceFlow>,
        exchanger: ScriptedExchanger,
        clock: Arc<ManualClock>,
    ) -> Self {
        let store = Arc::new(store);
        let exchanger = Arc::new(exchanger);
        let notifier = Arc::new(RecordingNotifier::default());
        let session = SessionManager::new(
            config,
            store.clone(),
            device_flow.clone(),
            exchanger.clone(),
        )
        .with_clock(clock.clone())
        .with_notifier(notifier.clone());
        Self {
            clock,
            store,
            device_flow,
            exchanger,
            notifier,
            session,
        }
    }
}
