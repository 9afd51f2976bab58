//! Policy source reader.
//!
//! Decodes a YAML document of the shape
//!
//! ```yaml
//! viewer:
//!   cpu_usage: 'namespace=~"prod.*"'
//! admin:
//!   /.*/: ""
//! ```
//!
//! into an ordered, unvalidated list of roles and their entries. Declaration
//! order is kept and repeated keys are passed through as-is; classification
//! and uniqueness checks happen in the compiler.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::de::{self, Deserialize, Deserializer, MapAccess, Visitor};
use sha2::{Digest, Sha256};

use crate::errors::PolicyError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    pub identifier: String,
    pub constraint: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRole {
    pub name: String,
    pub entries: Vec<RawEntry>,
}

/// A decoded policy document plus the SHA-256 digest of its text.
#[derive(Debug, Clone, Default)]
pub struct PolicySource {
    pub roles: Vec<RawRole>,
    pub digest: String,
}

pub fn read_policy_file(path: impl AsRef<Path>) -> Result<PolicySource, PolicyError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| PolicyError::SourceUnreadable {
        path: path.to_path_buf(),
        source,
    })?;
    parse_policy_str(&text)
}

pub fn parse_policy_str(text: &str) -> Result<PolicySource, PolicyError> {
    let digest = hex::encode(Sha256::digest(text.as_bytes()));

    // A blank document is an empty policy: every role is denied.
    if text.trim().is_empty() {
        return Ok(PolicySource {
            roles: Vec::new(),
            digest,
        });
    }

    let deserializer = serde_yaml::Deserializer::from_str(text);
    let table: RoleTable = serde_path_to_error::deserialize(deserializer).map_err(|err| {
        let location = err.path().to_string();
        PolicyError::MalformedDocument {
            location,
            message: err.into_inner().to_string(),
        }
    })?;

    Ok(PolicySource {
        roles: table.0,
        digest,
    })
}

struct RoleTable(Vec<RawRole>);

impl<'de> Deserialize<'de> for RoleTable {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct RoleTableVisitor;

        impl<'de> Visitor<'de> for RoleTableVisitor {
            type Value = RoleTable;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a mapping of role names to metric ACLs")
            }

            fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(RoleTable(Vec::new()))
            }

            // comment-only document
            fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(RoleTable(Vec::new()))
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut roles = Vec::new();
                while let Some((name, entries)) = map.next_entry::<String, EntryList>()? {
                    roles.push(RawRole {
                        name,
                        entries: entries.0,
                    });
                }
                Ok(RoleTable(roles))
            }
        }

        deserializer.deserialize_any(RoleTableVisitor)
    }
}

struct EntryList(Vec<RawEntry>);

impl<'de> Deserialize<'de> for EntryList {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct EntryListVisitor;

        impl<'de> Visitor<'de> for EntryListVisitor {
            type Value = EntryList;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a mapping of metric identifiers to query constraints")
            }

            // `role: ~` declares the role without granting anything
            fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(EntryList(Vec::new()))
            }

            fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(EntryList(Vec::new()))
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::new();
                while let Some((identifier, constraint)) =
                    map.next_entry::<String, ConstraintText>()?
                {
                    entries.push(RawEntry {
                        identifier,
                        constraint: constraint.0,
                    });
                }
                Ok(EntryList(entries))
            }
        }

        deserializer.deserialize_any(EntryListVisitor)
    }
}

/// Constraint text exactly as written. Null is the empty constraint; numbers
/// and booleans are rejected since their source spelling would be lost.
struct ConstraintText(String);

impl<'de> Deserialize<'de> for ConstraintText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ConstraintVisitor;

        impl<'de> Visitor<'de> for ConstraintVisitor {
            type Value = ConstraintText;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a quoted query constraint string")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
                Ok(ConstraintText(value.to_owned()))
            }

            fn visit_string<E: de::Error>(self, value: String) -> Result<Self::Value, E> {
                Ok(ConstraintText(value))
            }

            fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(ConstraintText(String::new()))
            }
        }

        deserializer.deserialize_any(ConstraintVisitor)
    }
}
