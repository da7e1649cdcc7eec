//! Resolves request credentials into an identity.
//!
//! Authentication never fails: missing, unknown or disabled credentials all
//! produce an anonymous context and authorization is left to the managers.

use std::sync::Arc;

use async_trait::async_trait;
use rest_core::{Identity, RequestContext};

use crate::models::User;
use crate::store::{Store, StoreError};
use crate::token::TokenKind;

/// Principal asserted by a trusted fronting proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertedPrincipal {
    pub email: String,
    pub is_admin: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub token: Option<String>,
    pub principal: Option<AssertedPrincipal>,
}

impl Credentials {
    pub fn token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            principal: None,
        }
    }
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, credentials: &Credentials) -> RequestContext;
}

pub struct StoreAuthenticator {
    store: Arc<dyn Store>,
}

impl StoreAuthenticator {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// `None` when the token belongs to a disabled identity.
    async fn resolve_token(&self, token: &str) -> Result<Option<Arc<dyn Identity>>, StoreError> {
        let identity: Arc<dyn Identity> = match TokenKind::classify(token) {
            TokenKind::ServiceAccount => {
                let account = self.store.find_service_account_by_token(token).await?;
                if !account.is_enabled() {
                    tracing::debug!(label = %account.label, "Service account is disabled");
                    return Ok(None);
                }
                Arc::new(account)
            }
            TokenKind::User => {
                let user = self.store.find_user_by_token(token).await?;
                if !user.is_enabled() {
                    tracing::debug!(username = %user.username, "User is disabled");
                    return Ok(None);
                }
                Arc::new(user)
            }
        };
        Ok(Some(identity))
    }

    async fn authenticate_token(&self, token: &str) -> RequestContext {
        let identity = match self.resolve_token(token).await {
            Ok(Some(identity)) => identity,
            Ok(None) => return RequestContext::anonymous(),
            Err(StoreError::NotFound(_)) => {
                tracing::debug!(kind = ?TokenKind::classify(token), "Unknown token");
                return RequestContext::anonymous();
            }
            Err(err) => {
                tracing::warn!(error = %err, "Token lookup failed, continuing anonymously");
                return RequestContext::anonymous();
            }
        };

        tracing::debug!(
            username = %identity.username(),
            kind = ?identity.kind(),
            "Request authenticated"
        );
        RequestContext::with_identity(identity)
    }
}

#[async_trait]
impl Authenticator for StoreAuthenticator {
    async fn authenticate(&self, credentials: &Credentials) -> RequestContext {
        if let Some(principal) = credentials.principal.as_ref().filter(|p| p.is_admin) {
            tracing::debug!(email = %principal.email, "Administrator principal asserted");
            let admin = User::from_principal(&principal.email, true);
            return RequestContext::with_identity(Arc::new(admin));
        }

        match credentials.token.as_deref() {
            Some(token) if !token.is_empty() => self.authenticate_token(token).await,
            _ => RequestContext::anonymous(),
        }
    }
}
