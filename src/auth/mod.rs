//! Device-flow authentication, token exchange and credential storage.

pub mod clock;
pub mod credential;
pub mod device_code;
pub mod device_flow;
pub mod error;
pub mod exchange;
pub mod http;
pub mod notify;
pub mod session;
pub mod store;

pub use clock::{Clock, SystemClock};
pub use credential::{AuthState, CredentialRecord};
pub use device_code::{DeviceCodePoll, DeviceCodeSession};
pub use device_flow::{DeviceFlow, GitHubDeviceFlow};
pub use error::{AuthError, Recovery};
pub use exchange::{classify_exchange_status, CopilotTokenExchanger, ServiceToken, TokenExchange};
pub use notify::{AuthNotifier, TerminalNotifier};
pub use session::SessionManager;
pub use store::{
    open_store, CredentialStore, FallbackCredentialStore, FileCredentialStore,
    KeyringCredentialStore,
};
