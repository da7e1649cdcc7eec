pub mod config;
pub mod db;
pub mod middleware;
pub mod models;
pub mod services;
pub mod store;
pub mod token;

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    middleware::{from_fn, from_fn_with_state},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use rest_core::error::AppError;
use rest_core::middleware::{request_id_middleware, request_span};
use rest_core::rest::{resource_routes, RestHandler};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::config::IdentityConfig;
use crate::services::{Authenticator, ServiceAccountManager, StoreAuthenticator};
use crate::store::Store;
use crate::token::{DefaultTokenGenerator, ServiceAccountTokenGenerator, TokenGenerator};

/// Path segment under which service accounts are served.
pub const SERVICE_ACCOUNT_RESOURCE: &str = "serviceaccount";

#[derive(Clone)]
pub struct AppState {
    pub config: IdentityConfig,
    pub store: Arc<dyn Store>,
    pub authenticator: Arc<dyn Authenticator>,
    pub service_accounts: Arc<RestHandler<ServiceAccountManager>>,
}

impl AppState {
    pub fn new(config: IdentityConfig, store: Arc<dyn Store>) -> Self {
        let generator = match config.token_seed {
            Some(seed) => DefaultTokenGenerator::seeded(seed),
            None => DefaultTokenGenerator::new(),
        };
        let tokens: Arc<dyn TokenGenerator> = Arc::new(ServiceAccountTokenGenerator::new(generator));

        let manager = Arc::new(ServiceAccountManager::new(store.clone(), tokens));
        let service_accounts = Arc::new(
            RestHandler::with_patch(SERVICE_ACCOUNT_RESOURCE, manager)
                .paging(config.rest.paging(), config.rest.export_page_size),
        );

        Self {
            authenticator: Arc::new(StoreAuthenticator::new(store.clone())),
            config,
            store,
            service_accounts,
        }
    }
}

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let (status, store_status) = match state.store.health_check().await {
        Ok(()) => (StatusCode::OK, "up"),
        Err(err) => {
            tracing::error!(error = %err, backend = state.store.backend_name(), "Store health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "down")
        }
    };

    (
        status,
        Json(json!({
            "status": if status == StatusCode::OK { "healthy" } else { "unhealthy" },
            "service": state.config.service_name,
            "version": state.config.service_version,
            "store": {
                "backend": state.store.backend_name(),
                "status": store_status,
            },
        })),
    )
}

pub async fn build_router(state: AppState) -> Result<Router, AppError> {
    let resources = Router::new().nest(
        &format!("/{}", SERVICE_ACCOUNT_RESOURCE),
        resource_routes(state.service_accounts.clone()),
    );

    let app = Router::new()
        .route("/health", get(health_check))
        .merge(resources)
        .layer(from_fn_with_state(
            state.clone(),
            middleware::authenticate_middleware,
        ))
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .layer(from_fn(request_id_middleware))
        .with_state(state);

    Ok(app)
}
