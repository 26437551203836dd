use serde::{Deserialize, Serialize};

/// The authenticated actor making a request.
///
/// Built once by the credential validator on successful lookup; never
/// mutated; lives for one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    /// Stable identifier (for authorization checks and audit records).
    pub id: String,

    /// Roles held by this principal.
    pub roles: Vec<Role>,

    /// The principal's home tenant.
    pub tenant: String,
}

impl Principal {
    /// Check if the principal holds a specific role.
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// System-admins may act across tenant boundaries.
    pub fn is_system_admin(&self) -> bool {
        self.has_role(Role::SystemAdmin)
    }

    /// Whether the principal holds any admin role at all.
    pub fn is_admin(&self) -> bool {
        self.has_role(Role::SystemAdmin) || self.has_role(Role::OrgAdmin)
    }

    /// Comma-joined role names, for the backend identity headers and logs.
    pub fn role_names(&self) -> String {
        self.roles
            .iter()
            .map(|r| r.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Admin roles recognized by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// May act for any tenant.
    SystemAdmin,
    /// May act only for the home tenant.
    OrgAdmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SystemAdmin => "system_admin",
            Role::OrgAdmin => "org_admin",
        }
    }
}
