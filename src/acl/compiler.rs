//! ACL entry compiler.
//!
//! Turns a decoded [`PolicySource`] into a [`RoleAclStore`]. An identifier
//! wrapped in slashes (`/node_.*/`) is a pattern; anything else is an exact
//! metric name. Compilation is all-or-nothing: the first bad entry aborts the
//! whole load.

use std::collections::HashMap;

use super::principal::Role;
use super::source::{PolicySource, RawEntry};
use super::store::{Acl, PatternRule, QueryConstraint, RoleAclStore};
use crate::errors::PolicyError;

pub const PATTERN_DELIMITER: char = '/';

/// How a policy identifier is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierClass<'a> {
    Exact(&'a str),
    /// Regex body with the delimiters stripped.
    Pattern(&'a str),
}

pub fn classify(identifier: &str) -> IdentifierClass<'_> {
    match identifier
        .strip_prefix(PATTERN_DELIMITER)
        .and_then(|rest| rest.strip_suffix(PATTERN_DELIMITER))
    {
        Some(body) => IdentifierClass::Pattern(body),
        None => IdentifierClass::Exact(identifier),
    }
}

/// A compiled entry, ready to be inserted into a role's ACL.
#[derive(Debug, Clone)]
pub enum MatchUnit {
    Exact {
        name: String,
        constraint: QueryConstraint,
    },
    Pattern(PatternRule),
}

pub fn compile_entry(role: &str, entry: &RawEntry) -> Result<MatchUnit, PolicyError> {
    let constraint = QueryConstraint::from(entry.constraint.as_str());

    match classify(&entry.identifier) {
        IdentifierClass::Exact(name) => Ok(MatchUnit::Exact {
            name: name.to_string(),
            constraint,
        }),
        IdentifierClass::Pattern(body) => PatternRule::new(&entry.identifier, body, constraint)
            .map(MatchUnit::Pattern)
            .map_err(|cause| PolicyError::InvalidPattern {
                role: role.to_string(),
                identifier: entry.identifier.clone(),
                cause,
            }),
    }
}

pub fn compile_policy(source: &PolicySource) -> Result<RoleAclStore, PolicyError> {
    let mut acls: HashMap<Role, Acl> = HashMap::with_capacity(source.roles.len());

    for raw in &source.roles {
        // A role repeated at the top level extends the same ACL.
        let acl = acls.entry(Role::from(raw.name.as_str())).or_default();
        for entry in &raw.entries {
            let unit = compile_entry(&raw.name, entry)?;
            acl.insert(&raw.name, unit)?;
        }

        tracing::debug!(
            role = %raw.name,
            exact = acl.exact_len(),
            patterns = acl.patterns().len(),
            "compiled role acl"
        );
    }

    Ok(RoleAclStore::from_parts(acls, source.digest.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acl::source::parse_policy_str;

    fn compile(text: &str) -> Result<RoleAclStore, PolicyError> {
        compile_policy(&parse_policy_str(text)?)
    }

    #[test]
    fn test_classify_identifiers() {
        assert_eq!(classify("cpu_usage"), IdentifierClass::Exact("cpu_usage"));
        assert_eq!(classify("/cpu_.*/"), IdentifierClass::Pattern("cpu_.*"));
        assert_eq!(classify("//"), IdentifierClass::Pattern(""));
        assert_eq!(classify("/"), IdentifierClass::Exact("/"));
        assert_eq!(classify("/cpu"), IdentifierClass::Exact("/cpu"));
        assert_eq!(classify("cpu/"), IdentifierClass::Exact("cpu/"));
        assert_eq!(classify("~cpu.*"), IdentifierClass::Exact("~cpu.*"));
    }

    #[test]
    fn test_compiles_exact_and_pattern_entries() {
        let store = compile(
            r#"
viewer:
  cpu_usage: 'namespace=~"prod.*"'
  /node_.*/: 'job="node"'
"#,
        )
        .unwrap();

        let acl = store.acl_for("viewer").unwrap();
        assert_eq!(acl.exact_len(), 1);
        assert_eq!(acl.patterns().len(), 1);
        assert_eq!(acl.patterns()[0].identifier(), "/node_.*/");
    }

    #[test]
    fn test_invalid_pattern_aborts_load() {
        let err = compile(
            r#"
admin:
  /.*/: ""
viewer:
  /cpu_(/: ""
"#,
        )
        .unwrap_err();

        match err {
            PolicyError::InvalidPattern { role, identifier, .. } => {
                assert_eq!(role, "viewer");
                assert_eq!(identifier, "/cpu_(/");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_duplicate_exact_entry_fails() {
        let err = compile("viewer:\n  up: a\n  up: b\n").unwrap_err();
        assert!(matches!(err, PolicyError::DuplicateEntry { .. }));
    }

    #[test]
    fn test_repeated_role_merges_and_detects_duplicates() {
        let store = compile("viewer:\n  up: a\nviewer:\n  down: b\n").unwrap();
        let acl = store.acl_for("viewer").unwrap();
        assert_eq!(acl.exact_len(), 2);

        let err = compile("viewer:\n  up: a\nviewer:\n  up: b\n").unwrap_err();
        assert!(matches!(err, PolicyError::DuplicateEntry { .. }));
    }

    #[test]
    fn test_same_name_exact_and_pattern_coexist() {
        let store = compile("viewer:\n  up: a\n  /up/: b\n").unwrap();
        let acl = store.acl_for("viewer").unwrap();
        assert_eq!(acl.lookup("up").unwrap().constraint.as_str(), "a");
    }

    #[test]
    fn test_absent_roles_get_no_acl() {
        let store = compile("viewer:\n  up: ''\n").unwrap();
        assert!(store.acl_for("admin").is_none());
        assert!(store.acl_for("Viewer").is_none());
    }

    #[test]
    fn test_summary_counts_rules() {
        let store = compile("a:\n  x: ''\n  /y.*/: ''\nb:\n  z: ''\n").unwrap();
        let summary = store.summary();
        assert_eq!(summary.roles, 2);
        assert_eq!(summary.exact_rules, 2);
        assert_eq!(summary.pattern_rules, 1);
        assert_eq!(summary.digest, store.digest());
    }
}
