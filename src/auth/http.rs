//! Shared HTTP client construction and Copilot request headers.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};

use super::error::AuthError;

pub const COPILOT_EDITOR_VERSION: &str = "vscode/1.96.2";
pub const COPILOT_EDITOR_PLUGIN_VERSION: &str = "copilot-chat/0.26.7";
pub const COPILOT_INTEGRATION_ID: &str = "vscode-chat";
pub const COPILOT_USER_AGENT: &str = "GitHubCopilotChat/0.26.7";
pub const COPILOT_API_VERSION: &str = "2025-04-01";

/// Build a client whose every request is bounded by `timeout`.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client, AuthError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .build()
        .map_err(|e| AuthError::Configuration(format!("Failed to build HTTP client: {e}")))
}

/// Editor identification headers expected by the Copilot endpoints.
pub fn copilot_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(
        "Editor-Version",
        HeaderValue::from_static(COPILOT_EDITOR_VERSION),
    );
    headers.insert(
        "Editor-Plugin-Version",
        HeaderValue::from_static(COPILOT_EDITOR_PLUGIN_VERSION),
    );
    headers.insert(
        "Copilot-Integration-Id",
        HeaderValue::from_static(COPILOT_INTEGRATION_ID),
    );
    headers.insert(USER_AGENT, HeaderValue::from_static(COPILOT_USER_AGENT));
    headers.insert(
        "X-Github-Api-Version",
        HeaderValue::from_static(COPILOT_API_VERSION),
    );
    headers
}
