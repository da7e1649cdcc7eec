use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::permission::Permission;

/// Outcome taxonomy shared by every resource manager.
///
/// The REST layer picks the status code and payload shape from the variant;
/// anything that is not one of the named kinds is `Internal` and is never
/// detailed to the client.
#[derive(Debug, Error)]
pub enum RestError {
    #[error("operation not supported")]
    Unsupported,

    #[error("invalid field '{field}': {message}")]
    Field { field: String, message: String },

    #[error("missing permission: {permission}")]
    Permission { permission: &'static str },

    #[error("resource not found")]
    NotFound,

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl RestError {
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        RestError::Field {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Permission error naming the first registered bit of `required`.
    pub fn permission(required: Permission) -> Self {
        RestError::Permission {
            permission: required.name(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            RestError::Unsupported => StatusCode::METHOD_NOT_ALLOWED,
            RestError::Field { .. } => StatusCode::BAD_REQUEST,
            RestError::Permission { .. } => StatusCode::FORBIDDEN,
            RestError::NotFound => StatusCode::NOT_FOUND,
            RestError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for RestError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RestError::NotFound,
            other => RestError::Internal(anyhow::Error::new(other)),
        }
    }
}

impl IntoResponse for RestError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: String,
            #[serde(skip_serializing_if = "Option::is_none")]
            field: Option<String>,
            #[serde(skip_serializing_if = "Option::is_none")]
            permission: Option<&'static str>,
        }

        let status = self.status();
        let body = match self {
            RestError::Field { field, message } => {
                tracing::debug!(field = %field, error = %message, "Rejected request payload");
                ErrorResponse {
                    error: message,
                    field: Some(field),
                    permission: None,
                }
            }
            RestError::Permission { permission } => {
                tracing::debug!(permission, "Permission denied");
                ErrorResponse {
                    error: format!("missing permission: {}", permission),
                    field: None,
                    permission: Some(permission),
                }
            }
            RestError::Internal(err) => {
                tracing::error!(error = ?err, "Request failed with internal error");
                ErrorResponse {
                    error: "Internal server error".to_string(),
                    field: None,
                    permission: None,
                }
            }
            other => ErrorResponse {
                error: other.to_string(),
                field: None,
                permission: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Process-level failures raised while starting or wiring the service.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    ConfigError(anyhow::Error),

    #[error("Database error: {0}")]
    DatabaseError(anyhow::Error),

    #[error("Internal server error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(anyhow::Error::new(err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(anyhow::Error::new(err))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(anyhow::Error::new(err))
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        AppError::DatabaseError(anyhow::Error::new(err))
    }
}
