use chrono::{DateTime, Utc};
use copilot_auth::auth::{AuthError, CopilotTokenExchanger, Recovery, TokenExchange};
use copilot_auth::config::AuthConfig;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn exchanger(server: &MockServer) -> CopilotTokenExchanger {
    let config = AuthConfig::builder()
        .service_token_url(format!("{}/copilot_internal/v2/token", server.uri()))
        .build();
    CopilotTokenExchanger::new(&config).expect("http client")
}

async fn mount_status(server: &MockServer, status: u16) {
    Mock::given(method("GET"))
        .and(path("/copilot_internal/v2/token"))
        .respond_with(ResponseTemplate::new(status).set_body_string("nope"))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn exchange_sends_editor_headers_and_parses_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/copilot_internal/v2/token"))
        .and(header("authorization", "Bearer gho_abc"))
        .and(header("editor-version", "vscode/1.96.2"))
        .and(header("copilot-integration-id", "vscode-chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "tid=1;exp=2;proxy-ep=proxy.individual.githubcopilot.com",
            "expires_at": 4_102_444_800_i64,
            "refresh_in": 1500
        })))
        .expect(1)
        .mount(&server)
        .await;

    let service = exchanger(&server).exchange("gho_abc").await.unwrap();

    assert_eq!(service.token, "tid=1;exp=2;proxy-ep=proxy.individual.githubcopilot.com");
    assert_eq!(
        service.expires_at,
        DateTime::<Utc>::from_timestamp(4_102_444_800, 0).unwrap()
    );
    assert_eq!(
        service.api_endpoint.as_deref(),
        Some("https://api.individual.githubcopilot.com")
    );
}

#[tokio::test]
async fn exchange_prefers_advertised_api_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/copilot_internal/v2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "tid=1;proxy-ep=proxy.individual.githubcopilot.com",
            "expires_at": "4102444800",
            "endpoints": { "api": "https://api.business.githubcopilot.com" }
        })))
        .mount(&server)
        .await;

    let service = exchanger(&server).exchange("gho_abc").await.unwrap();
    assert_eq!(
        service.api_endpoint.as_deref(),
        Some("https://api.business.githubcopilot.com")
    );
}

#[tokio::test]
async fn unauthorized_exchange_is_rejected() {
    for status in [401, 403, 404] {
        let server = MockServer::start().await;
        mount_status(&server, status).await;

        let err = exchanger(&server).exchange("gho_revoked").await.unwrap_err();
        assert!(
            matches!(err, AuthError::ExchangeRejected(_)),
            "status {status} gave {err:?}"
        );
        assert!(!err.is_retryable());
        assert_eq!(err.recovery(), Recovery::CheckSubscription);
    }
}

#[tokio::test]
async fn server_errors_and_throttling_are_retryable() {
    for status in [429, 500, 502, 503] {
        let server = MockServer::start().await;
        mount_status(&server, status).await;

        let err = exchanger(&server).exchange("gho_abc").await.unwrap_err();
        assert!(
            matches!(err, AuthError::ProviderUnavailable(_)),
            "status {status} gave {err:?}"
        );
        assert!(err.is_retryable());
    }
}

#[tokio::test]
async fn empty_token_is_not_accepted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/copilot_internal/v2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "",
            "expires_at": 4_102_444_800_i64
        })))
        .mount(&server)
        .await;

    let err = exchanger(&server).exchange("gho_abc").await.unwrap_err();
    assert!(matches!(err, AuthError::ProviderUnavailable(_)));
}

#[tokio::test]
async fn unreachable_endpoint_is_unavailable() {
    let server = MockServer::start().await;
    let exchanger = exchanger(&server);
    drop(server);

    let err = exchanger.exchange("gho_abc").await.unwrap_err();
    assert!(matches!(err, AuthError::ProviderUnavailable(_)));
}
