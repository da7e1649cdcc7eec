//! PostgreSQL store backed by the `service_accounts` and `users` tables.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rest_core::rest::ListOptions;
use rest_core::{sql, Permission};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};

use super::{
    ServiceAccountChanges, ServiceAccountStore, Store, StoreError, StoreResult, UserStore,
};
use crate::models::{ServiceAccount, User};

const SERVICE_ACCOUNT_COLUMNS: &str =
    "label, description, token, ip_restrictions, permission, created";

/// Columns compared numerically by list filters.
const INTEGER_COLUMNS: &[&str] = &["permission"];

#[derive(Debug, Clone, FromRow)]
struct DbServiceAccount {
    label: String,
    description: String,
    token: Option<String>,
    ip_restrictions: String,
    permission: i64,
    created: DateTime<Utc>,
}

impl From<DbServiceAccount> for ServiceAccount {
    fn from(row: DbServiceAccount) -> Self {
        ServiceAccount {
            label: row.label,
            description: row.description,
            token: row.token,
            ip_restrictions: row.ip_restrictions,
            permission: Permission::from_storage(row.permission),
            created: row.created,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
struct DbUser {
    username: String,
    email: String,
    token: Option<String>,
    permission: i64,
    created: DateTime<Utc>,
}

impl From<DbUser> for User {
    fn from(row: DbUser) -> Self {
        User {
            username: row.username,
            email: row.email,
            token: row.token,
            permission: Permission::from_storage(row.permission),
            created: row.created,
        }
    }
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Builds the list query for `opts`; exposed for inspection in tests.
fn list_query(opts: &ListOptions) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(format!(
        "SELECT {} FROM service_accounts",
        SERVICE_ACCOUNT_COLUMNS
    ));
    sql::push_where(&mut builder, &opts.filters, INTEGER_COLUMNS);
    sql::push_order(&mut builder, opts, "label");
    sql::push_paging(&mut builder, opts);
    builder
}

#[async_trait]
impl ServiceAccountStore for PgStore {
    async fn find_service_account(&self, label: &str) -> StoreResult<ServiceAccount> {
        let row = sqlx::query_as::<_, DbServiceAccount>(&format!(
            "SELECT {} FROM service_accounts WHERE label = $1",
            SERVICE_ACCOUNT_COLUMNS
        ))
        .bind(label)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ServiceAccount::from)
            .ok_or_else(|| StoreError::NotFound(format!("service account {}", label)))
    }

    async fn find_service_account_by_token(&self, token: &str) -> StoreResult<ServiceAccount> {
        let row = sqlx::query_as::<_, DbServiceAccount>(&format!(
            "SELECT {} FROM service_accounts WHERE token = $1",
            SERVICE_ACCOUNT_COLUMNS
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ServiceAccount::from)
            .ok_or_else(|| StoreError::NotFound("service account token".into()))
    }

    async fn list_service_accounts(&self, opts: &ListOptions) -> StoreResult<Vec<ServiceAccount>> {
        let mut builder = list_query(opts);
        let rows = builder
            .build_query_as::<DbServiceAccount>()
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(ServiceAccount::from).collect())
    }

    async fn insert_service_account(&self, account: &ServiceAccount) -> StoreResult<()> {
        sqlx::query(
            r#"INSERT INTO service_accounts (label, description, token, ip_restrictions, permission, created)
               VALUES ($1, $2, $3, $4, $5, $6)"#,
        )
        .bind(&account.label)
        .bind(&account.description)
        .bind(&account.token)
        .bind(&account.ip_restrictions)
        .bind(account.permission.to_storage())
        .bind(account.created)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_service_account(
        &self,
        label: &str,
        expected: Permission,
        changes: &ServiceAccountChanges,
    ) -> StoreResult<ServiceAccount> {
        let row = sqlx::query_as::<_, DbServiceAccount>(&format!(
            r#"UPDATE service_accounts
               SET description = $3, ip_restrictions = $4, permission = $5
               WHERE label = $1 AND permission = $2
               RETURNING {}"#,
            SERVICE_ACCOUNT_COLUMNS
        ))
        .bind(label)
        .bind(expected.to_storage())
        .bind(&changes.description)
        .bind(&changes.ip_restrictions)
        .bind(changes.permission.to_storage())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(row.into()),
            // tell a missing row from one whose permissions moved underneath us
            None => {
                self.find_service_account(label).await?;
                Err(StoreError::Conflict(format!(
                    "service account {} permissions changed",
                    label
                )))
            }
        }
    }

    async fn set_service_account_token(
        &self,
        label: &str,
        token: Option<&str>,
    ) -> StoreResult<ServiceAccount> {
        let row = sqlx::query_as::<_, DbServiceAccount>(&format!(
            "UPDATE service_accounts SET token = $2 WHERE label = $1 RETURNING {}",
            SERVICE_ACCOUNT_COLUMNS
        ))
        .bind(label)
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ServiceAccount::from)
            .ok_or_else(|| StoreError::NotFound(format!("service account {}", label)))
    }

    async fn delete_service_account(&self, label: &str) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM service_accounts WHERE label = $1")
            .bind(label)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("service account {}", label)));
        }
        Ok(())
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_user_by_token(&self, token: &str) -> StoreResult<User> {
        let row = sqlx::query_as::<_, DbUser>(
            "SELECT username, email, token, permission, created FROM users WHERE token = $1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::from)
            .ok_or_else(|| StoreError::NotFound("user token".into()))
    }
}

#[async_trait]
impl Store for PgStore {
    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rest_core::rest::{Filter, FilterOperator};

    #[test]
    fn list_query_binds_every_value() {
        let opts = ListOptions {
            order: Some("created".into()),
            descending: true,
            filters: vec![
                Filter::exact("token", "null"),
                Filter::new("permission", FilterOperator::GreaterThan, "1"),
            ],
            ..ListOptions::default()
        };
        let builder = list_query(&opts);
        assert_eq!(
            builder.sql(),
            "SELECT label, description, token, ip_restrictions, permission, created \
             FROM service_accounts WHERE \"token\" IS NULL AND \"permission\" > $1 \
             ORDER BY \"created\" DESC, \"label\" ASC LIMIT $2 OFFSET $3"
        );
    }

    #[tokio::test]
    #[ignore] // Requires running PostgreSQL
    async fn test_service_account_round_trip() {
        let pool = PgPool::connect("postgres://localhost/identity_test").await.unwrap();
        crate::db::run_migrations(&pool).await.unwrap();
        let store = PgStore::new(pool);

        let label = format!("pg-{}", Utc::now().timestamp_nanos_opt().unwrap_or_default());
        let mut account = ServiceAccount::new(label.clone(), Permission::ENABLED);
        account.token = Some(format!("SA:{}", label));
        store.insert_service_account(&account).await.unwrap();

        let found = store
            .find_service_account_by_token(account.token.as_deref().unwrap())
            .await
            .unwrap();
        assert_eq!(found.label, label);

        assert!(matches!(
            store.insert_service_account(&account).await,
            Err(StoreError::Conflict(_))
        ));

        let changes = ServiceAccountChanges {
            description: "nightly".into(),
            ip_restrictions: String::new(),
            permission: Permission::ENABLED | Permission::READ_USER,
        };
        let updated = store
            .update_service_account(&label, Permission::ENABLED, &changes)
            .await
            .unwrap();
        assert_eq!(updated.token, account.token);
        assert!(matches!(
            store.update_service_account(&label, Permission::ENABLED, &changes).await,
            Err(StoreError::Conflict(_))
        ));

        let revoked = store.set_service_account_token(&label, None).await.unwrap();
        assert_eq!(revoked.token, None);
        assert_eq!(revoked.description, "nightly");

        store.delete_service_account(&label).await.unwrap();
        assert!(matches!(
            store.find_service_account(&label).await,
            Err(StoreError::NotFound(_))
        ));
    }
}
