//! Ambient identity carried through a request.

use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::error::RestError;
use crate::permission::Permission;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityKind {
    User,
    ServiceAccount,
}

/// An authenticated principal capable of holding permission bits.
pub trait Identity: Send + Sync + fmt::Debug {
    fn username(&self) -> &str;

    fn kind(&self) -> IdentityKind;

    fn permissions(&self) -> Permission;

    fn has_permission(&self, bit: Permission) -> bool {
        self.permissions().has(bit)
    }
}

/// Request-scoped state threaded from the authenticator to the managers.
///
/// An empty context is an anonymous request: authentication never fails,
/// it only declines to attach an identity.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    identity: Option<Arc<dyn Identity>>,
}

impl RequestContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_identity(identity: Arc<dyn Identity>) -> Self {
        Self {
            identity: Some(identity),
        }
    }

    pub fn identity(&self) -> Option<&dyn Identity> {
        self.identity.as_deref()
    }

    pub fn is_anonymous(&self) -> bool {
        self.identity.is_none()
    }

    /// Returns the identity when it holds `bit`, otherwise a Permission error.
    pub fn require(&self, bit: Permission) -> Result<&dyn Identity, RestError> {
        match self.identity() {
            Some(identity) if identity.has_permission(bit) => Ok(identity),
            _ => Err(RestError::permission(bit)),
        }
    }

    /// True when the caller is the service account labelled `label`.
    pub fn is_service_account(&self, label: &str) -> bool {
        self.identity()
            .map(|identity| {
                identity.kind() == IdentityKind::ServiceAccount && identity.username() == label
            })
            .unwrap_or(false)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .unwrap_or_default())
    }
}
