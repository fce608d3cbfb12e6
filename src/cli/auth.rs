//! CLI command handlers for login, status, token, and logout.

use crate::auth::{AuthError, AuthState, SessionManager};

/// Handle `copilot-auth login`.
pub async fn handle_login(session: &SessionManager, force: bool) -> Result<(), AuthError> {
    session.try_authenticate(force).await?;
    let base_url = session.api_base_url().await;
    println!("✅ Copilot credentials ready");
    println!("   API: {base_url}");
    Ok(())
}

/// Handle `copilot-auth status`.
pub async fn handle_status(session: &SessionManager) -> Result<(), AuthError> {
    println!("🔐 Authentication Status\n");

    let record = session.record().await;
    let status = match session.state().await {
        AuthState::HasServiceToken => {
            let expiry = record
                .as_ref()
                .and_then(|r| r.service_expiry())
                .map(|e| e.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default();
            format!("✅ Logged in (service token expires {expiry})")
        }
        AuthState::HasProviderToken => "✅ Logged in (service token refreshes on next use)".to_string(),
        AuthState::Unauthenticated => "❌ Not logged in".to_string(),
    };
    println!("  Copilot: {status}");
    if let Some(account) = record.as_ref().and_then(|r| r.account_identifier.as_deref()) {
        println!("  Account: {account}");
    }

    let config = session.config();
    println!("\n📌 Storage:");
    println!("  Backend: {}", config.store_backend);
    println!("  File: {}", config.credentials_path.display());
    if config.override_token.is_some() {
        println!("  Using provider token from {}", crate::config::ENV_OVERRIDE_TOKEN);
    }
    Ok(())
}

/// Handle `copilot-auth token`.
pub async fn handle_token(session: &SessionManager) -> Result<(), AuthError> {
    let token = session.get_token().await?;
    println!("{token}");
    Ok(())
}

/// Handle `copilot-auth logout`.
pub async fn handle_logout(session: &SessionManager) -> Result<(), AuthError> {
    session.logout().await?;
    println!("✅ Logged out");
    Ok(())
}
