//! rest-core: permission model, request identity and the generic REST
//! resource dispatch layer shared by the identity services.
pub mod config;
pub mod error;
pub mod identity;
pub mod middleware;
pub mod observability;
pub mod permission;
pub mod rest;
pub mod sql;
pub mod validators;

pub use async_trait;
pub use axum;
pub use serde;
pub use serde_json;
pub use sqlx;
pub use tokio;
pub use tower;
pub use tower_http;
pub use tracing;

pub use error::{AppError, RestError};
pub use identity::{Identity, IdentityKind, RequestContext};
pub use permission::Permission;
