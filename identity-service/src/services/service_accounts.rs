//! Permission-checked CRUD for service accounts.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rest_core::rest::{ListOptions, Manager, PatchManager, RepresentationType, Resource};
use rest_core::sql::to_column_name;
use rest_core::validators::{KeyNameValidator, RawField};
use rest_core::{Permission, RequestContext, RestError};
use serde_json::{Map, Value};

use crate::models::service_account::{validate_ip_restrictions, COLUMNS};
use crate::models::ServiceAccount;
use crate::store::{ServiceAccountChanges, Store, StoreError};
use crate::token::TokenGenerator;

const PATCHABLE_FIELD: &str = "token";

pub struct ServiceAccountManager {
    store: Arc<dyn Store>,
    tokens: Arc<dyn TokenGenerator>,
}

impl ServiceAccountManager {
    pub fn new(store: Arc<dyn Store>, tokens: Arc<dyn TokenGenerator>) -> Self {
        Self { store, tokens }
    }

    fn check_columns(opts: &ListOptions) -> Result<(), RestError> {
        for filter in &opts.filters {
            if !COLUMNS.contains(&to_column_name(&filter.field).as_str()) {
                return Err(RestError::field(
                    filter.field.clone(),
                    format!("unknown filter field: {}", filter.field),
                ));
            }
        }
        if let Some(order) = opts.order.as_deref() {
            if !COLUMNS.contains(&to_column_name(order).as_str()) {
                return Err(RestError::field("order", format!("unknown order field: {}", order)));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Manager for ServiceAccountManager {
    type Resource = ServiceAccount;

    fn new_resource(&self, _ctx: &RequestContext) -> Result<ServiceAccount, RestError> {
        Ok(ServiceAccount::default())
    }

    /// A service account may always read itself; anyone else needs
    /// `read_user`.
    async fn from_id(&self, ctx: &RequestContext, id: &str) -> Result<ServiceAccount, RestError> {
        if !ctx.is_service_account(id) {
            ctx.require(Permission::READ_USER)?;
        }

        let account = self.store.find_service_account(id).await?;
        Ok(account)
    }

    async fn list_of(
        &self,
        ctx: &RequestContext,
        opts: &ListOptions,
    ) -> Result<Vec<ServiceAccount>, RestError> {
        ctx.require(Permission::READ_USER)?;
        Self::check_columns(opts)?;

        let accounts = self.store.list_service_accounts(opts).await?;
        Ok(accounts)
    }

    async fn list_of_properties(
        &self,
        ctx: &RequestContext,
        _opts: &ListOptions,
    ) -> Result<Vec<String>, RestError> {
        ctx.require(Permission::READ_USER)?;
        Err(RestError::Unsupported)
    }

    /// Inserts a new account without a token. The permission set in the body
    /// is granted with `write_user` alone; `edit_permissions` only guards
    /// later changes made through `update`.
    async fn create(
        &self,
        ctx: &RequestContext,
        account: &mut ServiceAccount,
        _bundle: &[u8],
    ) -> Result<(), RestError> {
        ctx.require(Permission::WRITE_USER)?;

        RawField::new("label", true, &account.label)
            .with_validator(KeyNameValidator)
            .validate()
            .map_err(|_| {
                RestError::field(
                    "label",
                    format!("invalid label {} for service account", account.label),
                )
            })?;
        validate_ip_restrictions(&account.ip_restrictions)?;

        account.token = None;
        account.created = Utc::now();

        match self.store.insert_service_account(account).await {
            Ok(()) => {}
            Err(StoreError::Conflict(_)) => {
                return Err(RestError::field("label", "service account already exists"));
            }
            Err(err) => return Err(err.into()),
        }

        tracing::info!(label = %account.label, "Service account created");
        Ok(())
    }

    /// Replaces description, IP restrictions and permissions. Changing the
    /// permission set also needs `edit_permissions`. The token is never
    /// written here, and the write is refused when the stored permissions no
    /// longer match the copy the caller loaded.
    async fn update(
        &self,
        ctx: &RequestContext,
        account: &mut ServiceAccount,
        bundle: &[u8],
    ) -> Result<(), RestError> {
        let current = ctx.require(Permission::WRITE_USER)?;

        let mut other = self.new_resource(ctx)?;
        other.from_representation(RepresentationType::Json, bundle)?;

        if other.permission != account.permission
            && !current.has_permission(Permission::EDIT_PERMISSIONS)
        {
            return Err(RestError::permission(Permission::EDIT_PERMISSIONS));
        }
        validate_ip_restrictions(&other.ip_restrictions)?;

        let changes = ServiceAccountChanges {
            description: other.description,
            ip_restrictions: other.ip_restrictions,
            permission: other.permission,
        };
        *account = match self
            .store
            .update_service_account(&account.label, account.permission, &changes)
            .await
        {
            Ok(stored) => stored,
            Err(StoreError::Conflict(_)) => {
                return Err(RestError::field(
                    "permissions",
                    "permissions were changed concurrently; reload and retry",
                ));
            }
            Err(err) => return Err(err.into()),
        };

        tracing::info!(label = %account.label, "Service account updated");
        Ok(())
    }

    async fn delete(&self, ctx: &RequestContext, account: &ServiceAccount) -> Result<(), RestError> {
        ctx.require(Permission::WRITE_USER)?;

        self.store.delete_service_account(&account.label).await?;

        tracing::info!(label = %account.label, "Service account deleted");
        Ok(())
    }
}

#[async_trait]
impl PatchManager<ServiceAccount> for ServiceAccountManager {
    /// Token rotation only: `null` revokes, any other value issues a fresh
    /// generated token.
    async fn patch(
        &self,
        ctx: &RequestContext,
        account: &mut ServiceAccount,
        fields: &Map<String, Value>,
    ) -> Result<(), RestError> {
        if !ctx.is_service_account(&account.label) {
            ctx.require(Permission::WRITE_USER)?;
        }

        if let Some(other) = fields.keys().find(|key| key.as_str() != PATCHABLE_FIELD) {
            return Err(RestError::field(other.clone(), "specified field can't be patched"));
        }
        let Some(value) = fields.get(PATCHABLE_FIELD) else {
            return Err(RestError::field("", "specified field can't be patched"));
        };

        let revoked = value.is_null();
        let token = if revoked {
            None
        } else {
            Some(self.tokens.generate_token())
        };

        *account = self
            .store
            .set_service_account_token(&account.label, token.as_deref())
            .await?;

        if revoked {
            tracing::info!(label = %account.label, "Service account token revoked");
        } else {
            tracing::info!(label = %account.label, "Service account token rotated");
        }
        Ok(())
    }
}
