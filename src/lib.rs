//! Copilot authentication
//!
//! Obtains and maintains credentials for the Copilot completion API without
//! the user ever pasting a secret: a GitHub device-code flow yields a
//! long-lived provider token, which is exchanged for short-lived service
//! tokens on demand. Credentials live in the platform keyring, falling back
//! to an owner-only file.
//!
//! # Quick Start
//!
//! ```no_run
//! use copilot_auth::auth::SessionManager;
//! use copilot_auth::config::AuthConfig;
//!
//! # async fn example() -> Result<(), copilot_auth::auth::AuthError> {
//! let session = SessionManager::from_config(AuthConfig::from_env())?;
//! if !session.is_authenticated().await {
//!     session.authenticate(false).await;
//! }
//! let request = reqwest::Client::new().post(format!(
//!     "{}/chat/completions",
//!     session.api_base_url().await
//! ));
//! let _request = session.authorize(request).await?;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod util;

#[cfg(feature = "cli")]
pub mod cli;
