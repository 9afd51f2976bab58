use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde::{Serialize, Serializer};

use super::compiler::MatchUnit;
use super::principal::Role;
use crate::errors::PolicyError;

/// Opaque constraint attached to a granted metric. Never interpreted here.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryConstraint(Arc<str>);

impl QueryConstraint {
    pub fn new(text: impl Into<Arc<str>>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for QueryConstraint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl From<&str> for QueryConstraint {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for QueryConstraint {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// A compiled pattern entry. The regex is anchored, so a match is a full match.
#[derive(Debug, Clone)]
pub struct PatternRule {
    identifier: String,
    regex: Regex,
    constraint: QueryConstraint,
}

impl PatternRule {
    /// `identifier` is the text as declared (delimiters included); `body` is the
    /// regex between the delimiters.
    pub fn new(
        identifier: impl Into<String>,
        body: &str,
        constraint: QueryConstraint,
    ) -> Result<Self, regex::Error> {
        let regex = Regex::new(&format!("^(?:{body})$"))?;
        Ok(Self {
            identifier: identifier.into(),
            regex,
            constraint,
        })
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn constraint(&self) -> &QueryConstraint {
        &self.constraint
    }

    pub fn is_match(&self, metric: &str) -> bool {
        self.regex.is_match(metric)
    }
}

/// The rule that granted a metric, borrowed from the ACL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AclMatch<'a> {
    /// Identifier as declared in the policy.
    pub rule: &'a str,
    pub constraint: &'a QueryConstraint,
}

/// Compiled policy of a single role.
#[derive(Debug, Clone, Default)]
pub struct Acl {
    exact: HashMap<String, QueryConstraint>,
    patterns: Vec<PatternRule>,
}

impl Acl {
    /// Exact names are consulted first; then patterns in declaration order,
    /// stopping at the first match.
    pub fn lookup(&self, metric: &str) -> Option<AclMatch<'_>> {
        if let Some((name, constraint)) = self.exact.get_key_value(metric) {
            return Some(AclMatch {
                rule: name,
                constraint,
            });
        }

        self.patterns
            .iter()
            .find(|rule| rule.is_match(metric))
            .map(|rule| AclMatch {
                rule: rule.identifier(),
                constraint: rule.constraint(),
            })
    }

    pub fn exact_len(&self) -> usize {
        self.exact.len()
    }

    pub fn patterns(&self) -> &[PatternRule] {
        &self.patterns
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.patterns.is_empty()
    }

    pub(crate) fn insert(&mut self, role: &str, unit: MatchUnit) -> Result<(), PolicyError> {
        match unit {
            MatchUnit::Exact { name, constraint } => {
                if self.exact.contains_key(&name) {
                    return Err(PolicyError::DuplicateEntry {
                        role: role.to_string(),
                        identifier: name,
                    });
                }
                self.exact.insert(name, constraint);
            }
            MatchUnit::Pattern(rule) => {
                if self.patterns.iter().any(|p| p.identifier == rule.identifier) {
                    return Err(PolicyError::DuplicateEntry {
                        role: role.to_string(),
                        identifier: rule.identifier,
                    });
                }
                self.patterns.push(rule);
            }
        }
        Ok(())
    }
}

/// Counts describing a compiled store, reported on load and by the HTTP surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicySummary {
    pub digest: String,
    pub roles: usize,
    pub exact_rules: usize,
    pub pattern_rules: usize,
}

/// Immutable role to ACL mapping. Built once by the compiler and shared
/// read-only afterwards; a reload replaces the whole store.
#[derive(Debug, Default)]
pub struct RoleAclStore {
    acls: HashMap<Role, Acl>,
    digest: String,
}

impl RoleAclStore {
    /// A store with no roles; denies everything.
    pub fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn from_parts(acls: HashMap<Role, Acl>, digest: String) -> Self {
        Self { acls, digest }
    }

    pub fn acl_for(&self, role: &str) -> Option<&Acl> {
        self.acls.get(role)
    }

    pub fn roles(&self) -> impl Iterator<Item = &Role> {
        self.acls.keys()
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn summary(&self) -> PolicySummary {
        PolicySummary {
            digest: self.digest.clone(),
            roles: self.acls.len(),
            exact_rules: self.acls.values().map(Acl::exact_len).sum(),
            pattern_rules: self.acls.values().map(|acl| acl.patterns().len()).sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exact(name: &str, constraint: &str) -> MatchUnit {
        MatchUnit::Exact {
            name: name.to_string(),
            constraint: constraint.into(),
        }
    }

    fn pattern(body: &str, constraint: &str) -> MatchUnit {
        MatchUnit::Pattern(PatternRule::new(format!("/{body}/"), body, constraint.into()).unwrap())
    }

    #[test]
    fn test_exact_wins_over_pattern() {
        let mut acl = Acl::default();
        acl.insert("r", pattern("cpu_.*", "from-pattern")).unwrap();
        acl.insert("r", exact("cpu_usage", "from-exact")).unwrap();

        let hit = acl.lookup("cpu_usage").unwrap();
        assert_eq!(hit.constraint.as_str(), "from-exact");
        assert_eq!(hit.rule, "cpu_usage");

        let hit = acl.lookup("cpu_idle").unwrap();
        assert_eq!(hit.constraint.as_str(), "from-pattern");
        assert_eq!(hit.rule, "/cpu_.*/");
    }

    #[test]
    fn test_first_pattern_wins() {
        let mut acl = Acl::default();
        acl.insert("r", pattern("node_.*", "first")).unwrap();
        acl.insert("r", pattern("node_cpu.*", "second")).unwrap();

        assert_eq!(acl.lookup("node_cpu_seconds").unwrap().constraint.as_str(), "first");
    }

    #[test]
    fn test_patterns_require_full_match() {
        let mut acl = Acl::default();
        acl.insert("r", pattern("cpu", "")).unwrap();
        assert!(acl.lookup("cpu").is_some());
        assert!(acl.lookup("cpu_usage").is_none());
        assert!(acl.lookup("node_cpu").is_none());
    }

    #[test]
    fn test_alternation_is_anchored_as_a_whole() {
        let mut acl = Acl::default();
        acl.insert("r", pattern("up|down", "")).unwrap();
        assert!(acl.lookup("up").is_some());
        assert!(acl.lookup("down").is_some());
        assert!(acl.lookup("upstream").is_none());
        assert!(acl.lookup("slowdown").is_none());
    }

    #[test]
    fn test_duplicate_exact_is_rejected() {
        let mut acl = Acl::default();
        acl.insert("viewer", exact("up", "a")).unwrap();
        let err = acl.insert("viewer", exact("up", "b")).unwrap_err();
        assert!(matches!(
            err,
            PolicyError::DuplicateEntry { ref role, ref identifier } if role == "viewer" && identifier == "up"
        ));
        assert_eq!(acl.lookup("up").unwrap().constraint.as_str(), "a");
    }

    #[test]
    fn test_duplicate_pattern_is_rejected() {
        let mut acl = Acl::default();
        acl.insert("viewer", pattern(".*", "a")).unwrap();
        assert!(acl.insert("viewer", pattern(".*", "b")).is_err());
    }

    #[test]
    fn test_empty_store_denies() {
        let store = RoleAclStore::empty();
        assert!(store.acl_for("admin").is_none());
        assert_eq!(store.summary().roles, 0);
    }
}
