mod common;

use axum::http::StatusCode;
use common::{test_config, TestApp, DISABLED_TOKEN, READER_TOKEN};
use identity_service::config::AuthConfig;
use rest_core::middleware::REQUEST_ID_HEADER;
use rest_core::Permission;

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::spawn().await;
    let response = app.request("GET", "/health", None, None).await;
    assert_eq!(response.status, StatusCode::OK);
    let body = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["store"]["backend"], "memory");
    assert!(response.header(REQUEST_ID_HEADER).is_some());
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let app = TestApp::spawn().await;
    let response = app
        .request_with("GET", "/health", None, &[(REQUEST_ID_HEADER, "req-42")], None)
        .await;
    assert_eq!(response.header(REQUEST_ID_HEADER), Some("req-42"));
}

#[tokio::test]
async fn test_user_token_authenticates() {
    let app = TestApp::spawn().await;
    let response = app.request("GET", "/serviceaccount", Some(READER_TOKEN), None).await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_invalid_credentials_degrade_to_anonymous() {
    let app = TestApp::spawn().await;
    app.seed_service_account("retired", Some("SA:retired"), Permission::READ_USER)
        .await;

    for token in ["nope", "SA:nope", DISABLED_TOKEN, "SA:retired"] {
        let response = app.request("GET", "/serviceaccount", Some(token), None).await;
        // authentication itself never rejects; authorization does
        assert_eq!(response.status, StatusCode::FORBIDDEN, "token {}", token);
        assert_eq!(response.json()["permission"], "read_user");
    }
}

#[tokio::test]
async fn test_principal_headers_are_ignored_by_default() {
    let app = TestApp::spawn().await;
    let response = app
        .request_with(
            "GET",
            "/serviceaccount",
            None,
            &[("x-principal-email", "root@example.com"), ("x-principal-admin", "true")],
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_trusted_admin_principal_bypasses_token() {
    let mut config = test_config();
    config.auth = AuthConfig {
        trust_principal_headers: true,
        ..AuthConfig::default()
    };
    let app = TestApp::spawn_with(config).await;

    let response = app
        .request_with(
            "GET",
            "/serviceaccount",
            None,
            &[("x-principal-email", "root@example.com"), ("x-principal-admin", "true")],
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);

    // a non-admin principal falls back to the token
    let response = app
        .request_with(
            "GET",
            "/serviceaccount",
            None,
            &[("x-principal-email", "dev@example.com")],
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let response = app
        .request_with(
            "GET",
            "/serviceaccount",
            Some(READER_TOKEN),
            &[("x-principal-email", "dev@example.com")],
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
}
