//! Test helpers for identity-service integration tests.
//!
//! Every `TestApp` runs the full router over a fresh in-memory store.

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use identity_service::{
    build_router,
    config::{AuthConfig, Environment, IdentityConfig, RestConfig, StoreBackend},
    models::{ServiceAccount, User},
    store::{MemoryStore, ServiceAccountStore},
    AppState,
};
use rest_core::Permission;
use serde_json::Value;
use tower::util::ServiceExt;

pub const ADMIN_TOKEN: &str = "admin-token";
pub const WRITER_TOKEN: &str = "writer-token";
pub const READER_TOKEN: &str = "reader-token";
pub const DISABLED_TOKEN: &str = "disabled-token";

pub fn test_config() -> IdentityConfig {
    IdentityConfig {
        common: rest_core::config::Config::default(),
        environment: Environment::Dev,
        service_name: "identity-service-test".to_string(),
        service_version: "0.0.0".to_string(),
        log_level: "error".to_string(),
        otlp_endpoint: None,
        store: StoreBackend::Memory,
        database: None,
        auth: AuthConfig::default(),
        rest: RestConfig::default(),
        token_seed: Some(7),
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("response body is not json")
    }

    pub fn text(&self) -> String {
        String::from_utf8(self.body.clone()).expect("response body is not utf-8")
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(test_config()).await
    }

    /// Seeds users holding admin, writer and reader permissions plus a
    /// disabled one, each with a fixed token.
    pub async fn spawn_with(config: IdentityConfig) -> Self {
        let store = Arc::new(MemoryStore::new());

        let users = [
            ("admin", ADMIN_TOKEN, Permission::all()),
            (
                "writer",
                WRITER_TOKEN,
                Permission::ENABLED | Permission::READ_USER | Permission::WRITE_USER,
            ),
            ("reader", READER_TOKEN, Permission::ENABLED | Permission::READ_USER),
            ("disabled", DISABLED_TOKEN, Permission::READ_USER | Permission::WRITE_USER),
        ];
        for (name, token, permission) in users {
            let mut user = User::new(name, format!("{}@example.com", name), permission);
            user.token = Some(token.to_string());
            store.insert_user(user).await.expect("Failed to seed user");
        }

        let state = AppState::new(config, store.clone());
        let router = build_router(state).await.expect("Failed to build router");

        Self { router, store }
    }

    pub async fn seed_service_account(
        &self,
        label: &str,
        token: Option<&str>,
        permission: Permission,
    ) -> ServiceAccount {
        let mut account = ServiceAccount::new(label, permission);
        account.token = token.map(str::to_string);
        self.store
            .insert_service_account(&account)
            .await
            .expect("Failed to seed service account");
        account
    }

    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        self.request_with(method, uri, token, &[], body).await
    }

    pub async fn request_with(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        headers: &[(&str, &str)],
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("x-auth-token", token);
        }
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.into_body().collect().await.unwrap().to_bytes().to_vec();
        TestResponse {
            status,
            headers,
            body,
        }
    }
}
