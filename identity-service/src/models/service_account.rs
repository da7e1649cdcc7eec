//! Service account - machine identity addressed by its label.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use rest_core::rest::{RepresentationType, Resource};
use rest_core::{Identity, IdentityKind, Permission, RestError};
use serde::{Deserialize, Serialize};

/// Storage columns a list request may filter or order on.
pub const COLUMNS: &[&str] = &[
    "label",
    "description",
    "token",
    "ip_restrictions",
    "permission",
    "created",
];

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceAccount {
    pub label: String,
    pub description: String,
    /// Without a token the account cannot authenticate.
    pub token: Option<String>,
    /// Comma-separated allow-list of addresses or CIDR ranges.
    pub ip_restrictions: String,
    pub permission: Permission,
    pub created: DateTime<Utc>,
}

impl Default for ServiceAccount {
    fn default() -> Self {
        Self {
            label: String::new(),
            description: String::new(),
            token: None,
            ip_restrictions: String::new(),
            permission: Permission::empty(),
            created: Utc::now(),
        }
    }
}

/// Outbound JSON shape.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ServiceAccountView<'a> {
    username: &'a str,
    label: &'a str,
    description: &'a str,
    token: Option<&'a str>,
    ip_restrictions: &'a str,
    permissions: Vec<&'static str>,
}

/// Inbound JSON shape. `username` and `token` are read-only and ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ServiceAccountPayload {
    label: String,
    description: String,
    ip_restrictions: String,
    permissions: Option<Vec<String>>,
}

impl ServiceAccount {
    pub fn new(label: impl Into<String>, permission: Permission) -> Self {
        Self {
            label: label.into(),
            permission,
            ..Self::default()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.permission.has(Permission::ENABLED)
    }

    pub fn permission_names(&self) -> Vec<&'static str> {
        self.permission.names()
    }
}

/// Checks every comma-separated entry is an IP address or `addr/prefix`.
pub fn validate_ip_restrictions(value: &str) -> Result<(), RestError> {
    for entry in value.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (addr, prefix) = match entry.split_once('/') {
            Some((addr, prefix)) => (addr, Some(prefix)),
            None => (entry, None),
        };

        let ip: IpAddr = addr.parse().map_err(|_| {
            RestError::field("ipRestrictions", format!("invalid ip address: {}", entry))
        })?;

        if let Some(prefix) = prefix {
            let max = if ip.is_ipv4() { 32 } else { 128 };
            match prefix.parse::<u8>() {
                Ok(bits) if bits <= max => {}
                _ => {
                    return Err(RestError::field(
                        "ipRestrictions",
                        format!("invalid network prefix: {}", entry),
                    ))
                }
            }
        }
    }
    Ok(())
}

impl Identity for ServiceAccount {
    fn username(&self) -> &str {
        &self.label
    }

    fn kind(&self) -> IdentityKind {
        IdentityKind::ServiceAccount
    }

    fn permissions(&self) -> Permission {
        self.permission
    }
}

impl Resource for ServiceAccount {
    fn id(&self) -> String {
        self.label.clone()
    }

    /// Replaces label, description, IP restrictions and the permission set.
    /// Token and creation time are never taken from a representation.
    fn from_representation(
        &mut self,
        rtype: RepresentationType,
        data: &[u8],
    ) -> Result<(), RestError> {
        match rtype {
            RepresentationType::Json => {
                let payload: ServiceAccountPayload = serde_json::from_slice(data)
                    .map_err(|e| RestError::field("json", format!("invalid json: {}", e)))?;
                self.label = payload.label;
                self.description = payload.description;
                self.ip_restrictions = payload.ip_restrictions;
                self.permission =
                    Permission::empty().grant_named(payload.permissions.unwrap_or_default());
                Ok(())
            }
            _ => Err(RestError::Unsupported),
        }
    }

    fn to_representation(&self, rtype: RepresentationType) -> Result<Vec<u8>, RestError> {
        match rtype {
            RepresentationType::Json => {
                let view = ServiceAccountView {
                    username: &self.label,
                    label: &self.label,
                    description: &self.description,
                    token: self.token.as_deref(),
                    ip_restrictions: &self.ip_restrictions,
                    permissions: self.permission_names(),
                };
                serde_json::to_vec(&view).map_err(|e| {
                    RestError::Internal(anyhow::anyhow!("failed to encode service account: {}", e))
                })
            }
            _ => Err(RestError::Unsupported),
        }
    }

    fn csv_header() -> &'static [&'static str] {
        &["label", "description", "ipRestrictions", "permissions", "created"]
    }

    // tokens stay out of bulk exports
    fn csv_record(&self) -> Vec<String> {
        vec![
            self.label.clone(),
            self.description.clone(),
            self.ip_restrictions.clone(),
            self.permission_names().join(" "),
            self.created.to_rfc3339(),
        ]
    }
}
