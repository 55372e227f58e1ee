//! Strong type definitions shared across the Veil platform.
//!
//! Identifiers are newtypes to prevent misuse at compile time.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Width of a principal identifier in decimal digits.
pub const PRINCIPAL_ID_DIGITS: usize = 10;

/// A stable principal identifier: a fixed-width numeric string, unique
/// across the credential table and every hashed-PII table.
///
/// Identifiers are reserved by [`sample`](PrincipalId::sample) during
/// onboarding; the storage layer's primary-key constraint is the
/// authoritative uniqueness guard.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(String);

impl PrincipalId {
    /// Wrap an existing identifier string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Sample a random identifier from the fixed-width numeric space.
    ///
    /// The result is uniform over [10^9, 10^10), so the leading digit is
    /// never zero and the string is always exactly ten characters.
    pub fn sample<R: rand::Rng>(rng: &mut R) -> Self {
        let n: u64 = rng.gen_range(1_000_000_000..10_000_000_000);
        Self(n.to_string())
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrincipalId({})", self.0)
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PrincipalId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Classification of a principal.
///
/// Only customers receive the universal wildcard scope at onboarding;
/// every other class starts with an empty scope list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PrincipalClass {
    /// An ordinary end user whose PII the platform holds.
    Customer,
    /// A service principal acting on behalf of an integration.
    Service,
}

impl PrincipalClass {
    /// The stored/wire form of the class.
    pub fn as_str(&self) -> &'static str {
        match self {
            PrincipalClass::Customer => "CUSTOMER",
            PrincipalClass::Service => "SERVICE",
        }
    }
}

impl std::str::FromStr for PrincipalClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CUSTOMER" => Ok(PrincipalClass::Customer),
            "SERVICE" => Ok(PrincipalClass::Service),
            other => Err(format!("unknown principal class: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_sampled_id_is_fixed_width() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let id = PrincipalId::sample(&mut rng);
            assert_eq!(id.as_str().len(), PRINCIPAL_ID_DIGITS);
            assert!(id.as_str().chars().all(|c| c.is_ascii_digit()));
            assert_ne!(id.as_str().as_bytes()[0], b'0');
        }
    }

    #[test]
    fn test_principal_class_wire_form() {
        let json = serde_json::to_string(&PrincipalClass::Customer).unwrap();
        assert_eq!(json, "\"CUSTOMER\"");
    }
}
