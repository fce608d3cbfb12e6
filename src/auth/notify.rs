//! Output channel for messages meant for the human at the keyboard.

use super::device_code::DeviceCodeSession;
use super::error::AuthError;

/// Presents device-flow instructions and failures to the user.
pub trait AuthNotifier: Send + Sync {
    /// Show where to go and which code to enter.
    fn device_code(&self, session: &DeviceCodeSession);

    fn authorized(&self, account: Option<&str>) {
        let _ = account;
    }

    fn failed(&self, error: &AuthError);
}

/// Writes prompts to stderr so stdout stays clean for piped token output.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalNotifier;

impl AuthNotifier for TerminalNotifier {
    fn device_code(&self, session: &DeviceCodeSession) {
        eprintln!("🔗 Visit: {}", session.verification_url);
        eprintln!("📋 Enter code: {}", session.user_code);
        eprintln!("⏳ Waiting for authorization...");
    }

    fn authorized(&self, account: Option<&str>) {
        match account {
            Some(login) => eprintln!("✅ Logged in as {login}"),
            None => eprintln!("✅ Login successful"),
        }
    }

    fn failed(&self, error: &AuthError) {
        eprintln!("❌ {error}");
        let hint = error.recovery().message();
        if !hint.is_empty() {
            eprintln!("   {hint}");
        }
    }
}
