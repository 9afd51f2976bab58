use serde::Serialize;

use super::aggregate::aggregate_decisions;
use super::principal::{Role, RoleSet};
use super::store::{QueryConstraint, RoleAclStore};

/// Outcome of an authorization check. Denial is a normal value, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorizationDecision {
    pub allowed: bool,
    pub constraint: Option<QueryConstraint>,
    pub role: Option<Role>,
}

impl AuthorizationDecision {
    pub fn deny() -> Self {
        Self {
            allowed: false,
            constraint: None,
            role: None,
        }
    }

    pub fn allow(role: Role, constraint: QueryConstraint) -> Self {
        Self {
            allowed: true,
            constraint: Some(constraint),
            role: Some(role),
        }
    }
}

/// Decides whether a caller's roles permit access to a metric.
///
/// Implementations must be callable concurrently without external locking
/// and must not block.
pub trait MetricAuthorizer: Send + Sync {
    fn authorize(&self, roles: &RoleSet, metric: &str) -> AuthorizationDecision;
}

impl RoleAclStore {
    /// Evaluate a single role.
    ///
    /// Evaluation order:
    /// 1. no ACL for the role -> deny
    /// 2. exact name match -> allow
    /// 3. first matching pattern, in declaration order -> allow
    /// 4. deny
    pub fn decide_for_role(&self, role: &Role, metric: &str) -> AuthorizationDecision {
        let Some(acl) = self.acl_for(role.as_str()) else {
            tracing::debug!(role = %role, metric = %metric, "no acl for role");
            return AuthorizationDecision::deny();
        };

        match acl.lookup(metric) {
            Some(hit) => {
                tracing::debug!(
                    role = %role,
                    metric = %metric,
                    rule = %hit.rule,
                    "metric granted"
                );
                AuthorizationDecision::allow(role.clone(), hit.constraint.clone())
            }
            None => {
                tracing::debug!(role = %role, metric = %metric, "metric denied for role");
                AuthorizationDecision::deny()
            }
        }
    }
}

impl MetricAuthorizer for RoleAclStore {
    fn authorize(&self, roles: &RoleSet, metric: &str) -> AuthorizationDecision {
        aggregate_decisions(roles.iter().map(|role| self.decide_for_role(role, metric)))
    }
}
