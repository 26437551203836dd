use super::TenantPolicy;
use crate::auth::Principal;

/// Outcome of an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

/// Why a request was denied.
///
/// Each variant carries a distinct machine-readable code; audit records and
/// 403 bodies both depend on the codes staying stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// Principal holds neither admin role.
    Role,
    /// Org-admin acting outside its home tenant.
    CrossTenant,
    /// Tenant restricts admins to an explicit list and the principal is not
    /// on it.
    NotTenantAdmin,
    /// Operation is not in the tenant's enabled set.
    OperationNotEnabled,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::Role => "role",
            DenyReason::CrossTenant => "cross-tenant",
            DenyReason::NotTenantAdmin => "not-tenant-admin",
            DenyReason::OperationNotEnabled => "operation-not-enabled",
        }
    }

    /// Caller-facing message. Denial reasons are not secret-bearing, so the
    /// 403 body may say why.
    pub fn message(&self) -> &'static str {
        match self {
            DenyReason::Role => "Gateway access requires an admin role",
            DenyReason::CrossTenant => "Admins may not act across tenant boundaries",
            DenyReason::NotTenantAdmin => "Principal is not an admin of the requested tenant",
            DenyReason::OperationNotEnabled => "Operation is not enabled for the requested tenant",
        }
    }
}

/// Decide whether `principal` may perform `operation` for `tenant_id`.
///
/// Checks short-circuit in order:
///
/// 1. the principal must hold an admin role;
/// 2. org-admins must stay inside their home tenant (system-admins are
///    exempt);
/// 3. if the tenant lists specific admins, org-admins must be on the list;
/// 4. the operation must be enabled for the tenant.
///
/// A tenant without a configured policy behaves as an empty policy: nothing
/// is enabled, so every operation is denied at step 4.
pub fn authorize(
    principal: &Principal,
    tenant_id: &str,
    operation: &str,
    policy: Option<&TenantPolicy>,
) -> Decision {
    if !principal.is_admin() {
        return Decision::Deny(DenyReason::Role);
    }

    if !principal.is_system_admin() {
        if principal.tenant != tenant_id {
            return Decision::Deny(DenyReason::CrossTenant);
        }

        if let Some(policy) = policy {
            if !policy.admins.is_empty() && !policy.admins.contains(&principal.id) {
                return Decision::Deny(DenyReason::NotTenantAdmin);
            }
        }
    }

    let enabled = policy.map(|p| p.operations.contains(operation)).unwrap_or(false);
    if !enabled {
        return Decision::Deny(DenyReason::OperationNotEnabled);
    }

    Decision::Allow
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::auth::Role;

    fn principal(id: &str, roles: Vec<Role>, tenant: &str) -> Principal {
        Principal {
            id: id.into(),
            roles,
            tenant: tenant.into(),
        }
    }

    fn policy(admins: &[&str], operations: &[&str]) -> TenantPolicy {
        TenantPolicy {
            admins: admins.iter().map(|s| s.to_string()).collect(),
            operations: operations.iter().map(|s| s.to_string()).collect(),
            rate_limit: None,
        }
    }

    #[test]
    fn test_non_admin_denied_on_role() {
        let p = principal("bob", vec![], "acme");
        let pol = policy(&[], &["modules.list"]);
        assert_eq!(
            authorize(&p, "acme", "modules.list", Some(&pol)),
            Decision::Deny(DenyReason::Role)
        );
    }

    #[test]
    fn test_org_admin_cross_tenant_denied_regardless_of_operation() {
        let p = principal("alice", vec![Role::OrgAdmin], "acme");
        let pol = policy(&[], &["modules.list"]);
        for op in ["modules.list", "anything-else"] {
            assert_eq!(
                authorize(&p, "other", op, Some(&pol)),
                Decision::Deny(DenyReason::CrossTenant)
            );
        }
    }

    #[test]
    fn test_system_admin_exempt_from_cross_tenant() {
        let p = principal("root", vec![Role::SystemAdmin], "ops");
        let pol = policy(&[], &["modules.list"]);
        assert_eq!(
            authorize(&p, "acme", "modules.list", Some(&pol)),
            Decision::Allow
        );
    }

    #[test]
    fn test_system_admin_exempt_from_tenant_admin_list() {
        let p = principal("root", vec![Role::SystemAdmin], "ops");
        let pol = policy(&["someone-else"], &["modules.list"]);
        assert_eq!(
            authorize(&p, "acme", "modules.list", Some(&pol)),
            Decision::Allow
        );
    }

    #[test]
    fn test_org_admin_not_on_tenant_admin_list_denied() {
        let p = principal("alice", vec![Role::OrgAdmin], "acme");
        let pol = policy(&["carol"], &["modules.list"]);
        assert_eq!(
            authorize(&p, "acme", "modules.list", Some(&pol)),
            Decision::Deny(DenyReason::NotTenantAdmin)
        );
    }

    #[test]
    fn test_empty_admin_list_admits_home_org_admin() {
        let p = principal("alice", vec![Role::OrgAdmin], "acme");
        let pol = policy(&[], &["modules.list"]);
        assert_eq!(
            authorize(&p, "acme", "modules.list", Some(&pol)),
            Decision::Allow
        );
    }

    #[rstest]
    #[case("modules.create")]
    #[case("MODULES.LIST")] // exact match, no case folding
    #[case("")]
    fn test_disabled_operation_denied(#[case] op: &str) {
        let p = principal("alice", vec![Role::OrgAdmin], "acme");
        let pol = policy(&[], &["modules.list"]);
        assert_eq!(
            authorize(&p, "acme", op, Some(&pol)),
            Decision::Deny(DenyReason::OperationNotEnabled)
        );
    }

    #[test]
    fn test_unknown_tenant_behaves_as_empty_policy() {
        let p = principal("root", vec![Role::SystemAdmin], "ops");
        assert_eq!(
            authorize(&p, "ghost", "modules.list", None),
            Decision::Deny(DenyReason::OperationNotEnabled)
        );
    }

    #[test]
    fn test_checks_short_circuit_in_order() {
        // A non-admin acting cross-tenant on a disabled operation fails on
        // the role check first.
        let p = principal("bob", vec![], "acme");
        assert_eq!(
            authorize(&p, "other", "nope", None),
            Decision::Deny(DenyReason::Role)
        );
    }

    #[test]
    fn test_deny_reason_codes_are_distinct() {
        let reasons = [
            DenyReason::Role,
            DenyReason::CrossTenant,
            DenyReason::NotTenantAdmin,
            DenyReason::OperationNotEnabled,
        ];
        let codes: std::collections::HashSet<_> =
            reasons.iter().map(|r| r.as_str()).collect();
        assert_eq!(codes.len(), reasons.len());
    }
}
