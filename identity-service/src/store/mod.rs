//! System of record for identities.

use async_trait::async_trait;
use rest_core::rest::ListOptions;
use rest_core::{Permission, RestError};
use thiserror::Error;

use crate::models::{ServiceAccount, User};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if matches!(err, sqlx::Error::RowNotFound) {
            return StoreError::NotFound("row".into());
        }
        if is_unique_violation(&err) {
            return StoreError::Conflict(err.to_string());
        }
        StoreError::Unexpected(anyhow::Error::new(err))
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        return db_err.code().map(|code| code == "23505").unwrap_or(false);
    }
    false
}

impl From<StoreError> for RestError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => RestError::NotFound,
            StoreError::Conflict(what) => RestError::Internal(anyhow::anyhow!("conflict: {}", what)),
            StoreError::Unexpected(err) => RestError::Internal(err),
        }
    }
}

/// Mutable fields of a service account other than its token.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceAccountChanges {
    pub description: String,
    pub ip_restrictions: String,
    pub permission: Permission,
}

#[async_trait]
pub trait ServiceAccountStore: Send + Sync {
    async fn find_service_account(&self, label: &str) -> StoreResult<ServiceAccount>;

    /// Exact token equality.
    async fn find_service_account_by_token(&self, token: &str) -> StoreResult<ServiceAccount>;

    /// Filtered, ordered page of at most `opts.size + 1` accounts. Field names
    /// in `opts` must already be known columns.
    async fn list_service_accounts(&self, opts: &ListOptions) -> StoreResult<Vec<ServiceAccount>>;

    /// Conflict when the label or token is taken.
    async fn insert_service_account(&self, account: &ServiceAccount) -> StoreResult<()>;

    /// Writes the fields Update may change and returns the stored row. The
    /// token is left alone. Conflict when the stored permission set is no
    /// longer `expected`.
    async fn update_service_account(
        &self,
        label: &str,
        expected: Permission,
        changes: &ServiceAccountChanges,
    ) -> StoreResult<ServiceAccount>;

    /// Writes only the token and returns the stored row.
    async fn set_service_account_token(
        &self,
        label: &str,
        token: Option<&str>,
    ) -> StoreResult<ServiceAccount>;

    async fn delete_service_account(&self, label: &str) -> StoreResult<()>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user_by_token(&self, token: &str) -> StoreResult<User>;
}

#[async_trait]
pub trait Store: ServiceAccountStore + UserStore {
    async fn health_check(&self) -> StoreResult<()>;

    fn backend_name(&self) -> &'static str;
}
