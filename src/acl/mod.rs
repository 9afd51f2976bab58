//! Role-scoped metric access control.
//!
//! A policy document maps roles to metric identifiers and the query
//! constraint to enforce when the identifier matches. This module:
//! - reads the document (`source`)
//! - compiles it into an immutable [`RoleAclStore`] (`compiler`)
//! - authorizes `(roles, metric)` pairs against the store ([`MetricAuthorizer`])
//! - merges per-role outcomes with union semantics ([`aggregate_decisions`])
//! - swaps in reloaded policies without locking readers ([`PolicyHandle`])

mod aggregate;
mod authorizer;
mod compiler;
mod principal;
mod reload;
mod source;
mod store;

pub use aggregate::aggregate_decisions;
pub use authorizer::{AuthorizationDecision, MetricAuthorizer};
pub use compiler::{classify, compile_entry, compile_policy, IdentifierClass, MatchUnit, PATTERN_DELIMITER};
pub use principal::{Role, RoleSet};
pub use reload::PolicyHandle;
pub use source::{parse_policy_str, read_policy_file, PolicySource, RawEntry, RawRole};
pub use store::{Acl, AclMatch, PatternRule, PolicySummary, QueryConstraint, RoleAclStore};

use std::path::Path;

use crate::errors::PolicyError;

/// Read and compile a policy file.
pub fn load_policy_file(path: impl AsRef<Path>) -> Result<RoleAclStore, PolicyError> {
    compile_policy(&read_policy_file(path)?)
}

/// Compile a policy document held in memory.
pub fn load_policy_str(text: &str) -> Result<RoleAclStore, PolicyError> {
    compile_policy(&parse_policy_str(text)?)
}
