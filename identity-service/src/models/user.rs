//! Interactive user identity.

use chrono::{DateTime, Utc};
use rest_core::{Identity, IdentityKind, Permission};

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub username: String,
    pub email: String,
    pub token: Option<String>,
    pub permission: Permission,
    pub created: DateTime<Utc>,
}

impl User {
    pub fn new(username: impl Into<String>, email: impl Into<String>, permission: Permission) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            token: None,
            permission,
            created: Utc::now(),
        }
    }

    /// User asserted by an external authentication layer. The platform
    /// administrator receives every permission bit.
    pub fn from_principal(email: &str, is_admin: bool) -> Self {
        let permission = if is_admin {
            Permission::all()
        } else {
            Permission::empty()
        };
        Self::new(email, email, permission)
    }

    pub fn is_enabled(&self) -> bool {
        self.permission.has(Permission::ENABLED)
    }
}

impl Identity for User {
    fn username(&self) -> &str {
        &self.username
    }

    fn kind(&self) -> IdentityKind {
        IdentityKind::User
    }

    fn permissions(&self) -> Permission {
        self.permission
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_principal_holds_every_permission() {
        let admin = User::from_principal("root@example.com", true);
        for (bit, _) in rest_core::permission::REGISTRY.iter() {
            assert!(admin.has_permission(*bit));
        }
        assert_eq!(admin.username(), "root@example.com");
    }

    #[test]
    fn plain_principal_holds_nothing() {
        let user = User::from_principal("someone@example.com", false);
        assert_eq!(user.permission, Permission::empty());
        assert!(!user.is_enabled());
    }
}
