//! The scope grammar and wildcard matcher.
//!
//! A scope is an opaque permission atom of the form `entity:action:field`,
//! or the universal wildcard `*`. Principals may also carry role
//! references (`assume:<role>`), which are expanded exactly one level deep
//! by the scope resolver; a role's own scope list is never re-expanded.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Prefix marking a role reference inside a principal's scope list.
pub const ROLE_PREFIX: &str = "assume:";

/// A parsed permission atom.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope {
    /// The universal wildcard `*`, granting everything.
    Universal,
    /// An `entity:action:field` triple; any segment may itself be `*`.
    Field {
        entity: String,
        action: String,
        field: String,
    },
}

impl Scope {
    /// Construct a read scope for a field of an entity.
    pub fn read(entity: &str, field: &str) -> Self {
        Scope::Field {
            entity: entity.to_string(),
            action: "read".to_string(),
            field: field.to_string(),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Universal => f.write_str("*"),
            Scope::Field {
                entity,
                action,
                field,
            } => write!(f, "{}:{}:{}", entity, action, field),
        }
    }
}

impl FromStr for Scope {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "*" {
            return Ok(Scope::Universal);
        }
        let mut parts = s.split(':');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(entity), Some(action), Some(field), None)
                if !entity.is_empty() && !action.is_empty() && !field.is_empty() =>
            {
                Ok(Scope::Field {
                    entity: entity.to_string(),
                    action: action.to_string(),
                    field: field.to_string(),
                })
            }
            _ => Err(CoreError::MalformedScope(s.to_string())),
        }
    }
}

impl Serialize for Scope {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Scope {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Partition raw grant strings into direct scopes and role names.
///
/// Grant strings that are neither the wildcard, a well-formed triple, nor
/// a role reference cannot satisfy any check and are dropped.
pub fn partition_grants(grants: &[String]) -> (Vec<Scope>, Vec<String>) {
    let mut direct = Vec::new();
    let mut roles = Vec::new();

    for grant in grants {
        if let Some(role) = grant.strip_prefix(ROLE_PREFIX) {
            roles.push(role.to_string());
        } else if let Ok(scope) = grant.parse::<Scope>() {
            direct.push(scope);
        }
    }

    (direct, roles)
}

/// A principal's effective permission set, after role expansion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeSet {
    scopes: HashSet<Scope>,
}

impl ScopeSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a scope. Duplicates collapse.
    pub fn insert(&mut self, scope: Scope) {
        self.scopes.insert(scope);
    }

    /// Number of distinct scopes held.
    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    /// Whether the set holds no scopes at all.
    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Whether the set contains this exact scope (no generalization).
    pub fn contains(&self, scope: &Scope) -> bool {
        self.scopes.contains(scope)
    }

    /// The wildcard matcher: does this set satisfy `required`?
    ///
    /// True when the set holds the universal wildcard, the exact required
    /// triple, or any of the seven proper generalizations obtained by
    /// replacing a non-empty subset of {entity, action, field} with `*`.
    pub fn allows(&self, required: &Scope) -> bool {
        if self.scopes.contains(&Scope::Universal) {
            return true;
        }
        if self.scopes.contains(required) {
            return true;
        }

        let Scope::Field {
            entity,
            action,
            field,
        } = required
        else {
            // Universal is only satisfied by holding `*` itself.
            return false;
        };

        // Every combination in the powerset of the three segments, minus
        // the identity case checked above.
        for mask in 1u8..8 {
            let generalized = Scope::Field {
                entity: segment(entity, mask & 0b100 != 0),
                action: segment(action, mask & 0b010 != 0),
                field: segment(field, mask & 0b001 != 0),
            };
            if self.scopes.contains(&generalized) {
                return true;
            }
        }

        false
    }

    /// Scopes in this set, in deterministic order.
    pub fn iter_sorted(&self) -> Vec<&Scope> {
        let mut scopes: Vec<&Scope> = self.scopes.iter().collect();
        scopes.sort();
        scopes
    }
}

fn segment(value: &str, wildcard: bool) -> String {
    if wildcard {
        "*".to_string()
    } else {
        value.to_string()
    }
}

impl FromIterator<Scope> for ScopeSet {
    fn from_iter<I: IntoIterator<Item = Scope>>(iter: I) -> Self {
        Self {
            scopes: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(grants: &[&str]) -> ScopeSet {
        grants.iter().map(|s| s.parse::<Scope>().unwrap()).collect()
    }

    #[test]
    fn test_scope_parse_round_trip() {
        let s: Scope = "identity:read:firstname".parse().unwrap();
        assert_eq!(s.to_string(), "identity:read:firstname");
        let w: Scope = "*".parse().unwrap();
        assert_eq!(w, Scope::Universal);
    }

    #[test]
    fn test_scope_parse_rejects_malformed() {
        assert!("identity:read".parse::<Scope>().is_err());
        assert!("a:b:c:d".parse::<Scope>().is_err());
        assert!("::".parse::<Scope>().is_err());
        assert!("".parse::<Scope>().is_err());
    }

    #[test]
    fn test_every_generalization_matches() {
        let required: Scope = "m:a:f".parse().unwrap();
        let granted_forms = [
            "m:a:f", "m:a:*", "m:*:f", "m:*:*", "*:a:f", "*:a:*", "*:*:f", "*:*:*", "*",
        ];
        for form in granted_forms {
            assert!(
                set(&[form]).allows(&required),
                "granted {{{form}}} should satisfy m:a:f"
            );
        }
    }

    #[test]
    fn test_unrelated_entity_fails() {
        let required: Scope = "m:a:f".parse().unwrap();
        assert!(!set(&["x:a:f"]).allows(&required));
        assert!(!set(&["m:x:f"]).allows(&required));
        assert!(!set(&["m:a:x"]).allows(&required));
        assert!(!ScopeSet::new().allows(&required));
    }

    #[test]
    fn test_partition_grants() {
        let grants = vec![
            "identity:read:firstname".to_string(),
            "assume:analyst".to_string(),
            "*".to_string(),
            "assume:auditor".to_string(),
            "not a scope".to_string(),
        ];
        let (direct, roles) = partition_grants(&grants);
        assert_eq!(direct.len(), 2);
        assert_eq!(roles, vec!["analyst", "auditor"]);
    }

    proptest::proptest! {
        /// Adding a scope never revokes a previously satisfied check.
        #[test]
        fn prop_allows_is_monotonic(
            entity in "[a-z]{1,8}",
            action in "[a-z]{1,8}",
            field in "[a-z]{1,8}",
            extra_entity in "[a-z]{1,8}",
            extra_field in "[a-z]{1,8}",
        ) {
            let required = Scope::Field {
                entity: entity.clone(),
                action: action.clone(),
                field: field.clone(),
            };
            let mut granted = set(&[&format!("{entity}:{action}:{field}")]);
            proptest::prop_assert!(granted.allows(&required));

            granted.insert(Scope::read(&extra_entity, &extra_field));
            proptest::prop_assert!(granted.allows(&required));

            granted.insert(Scope::Universal);
            proptest::prop_assert!(granted.allows(&required));
        }
    }
}
