//! The field catalog: static classification of every PII attribute.
//!
//! The catalog is declared once, built at process start, and treated as
//! immutable configuration for the process lifetime. Concurrent readers
//! need no synchronization. A field absent from the catalog is unknown
//! and therefore denied everywhere.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;
use crate::value::ValueType;

/// The owning entity a PII field belongs to.
///
/// A level is both the unit of hashed-PII row grouping and the unit of
/// partitioning for encrypted vault storage. Its lowercase name is the
/// entity segment of scope strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Who the principal is: names, birth date, contact number.
    Identity,
    /// Where the principal lives.
    Residence,
}

impl Level {
    /// All levels, in deterministic merge order.
    pub const ALL: [Level; 2] = [Level::Identity, Level::Residence];

    /// The lowercase entity name used in scope strings and table names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Identity => "identity",
            Level::Residence => "residence",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "identity" => Ok(Level::Identity),
            "residence" => Ok(Level::Residence),
            other => Err(CoreError::UnknownLevel(other.to_string())),
        }
    }
}

/// Classification of a single catalog field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    /// The owning entity.
    pub level: Level,
    /// The declared value type, which decides the stored representation.
    pub value_type: ValueType,
}

/// The process-wide field registry.
///
/// Built once by [`FieldCatalog::builtin`] and shared by reference; never
/// rebuilt per request and never mutated after construction.
#[derive(Debug, Clone)]
pub struct FieldCatalog {
    fields: BTreeMap<&'static str, FieldDef>,
    natural_key: &'static str,
}

impl FieldCatalog {
    /// The platform's field registry.
    pub fn builtin() -> Self {
        let mut fields = BTreeMap::new();

        let mut declare = |name: &'static str, level: Level, value_type: ValueType| {
            fields.insert(name, FieldDef { level, value_type });
        };

        declare("firstname", Level::Identity, ValueType::String);
        declare("lastname", Level::Identity, ValueType::String);
        declare("dob", Level::Identity, ValueType::Date);
        declare("mobile", Level::Identity, ValueType::String);
        declare("age", Level::Identity, ValueType::Number);
        declare("address", Level::Residence, ValueType::String);
        declare("pincode", Level::Residence, ValueType::String);

        Self {
            fields,
            natural_key: "mobile",
        }
    }

    /// Look up a field's classification. `None` means unknown/denied.
    pub fn lookup(&self, field: &str) -> Option<&FieldDef> {
        self.fields.get(field)
    }

    /// Whether the catalog declares this field.
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// The field whose value is the natural key for onboarding
    /// deduplication.
    pub fn natural_key(&self) -> &'static str {
        self.natural_key
    }

    /// All field names, in deterministic order.
    pub fn field_names(&self) -> Vec<&'static str> {
        self.fields.keys().copied().collect()
    }

    /// All fields belonging to a level, in deterministic order.
    pub fn fields_of(&self, level: Level) -> Vec<&'static str> {
        self.fields
            .iter()
            .filter(|(_, def)| def.level == level)
            .map(|(name, _)| *name)
            .collect()
    }

    /// All numeric field names, used by aggregate-validation detail.
    pub fn numeric_fields(&self) -> Vec<&'static str> {
        self.fields
            .iter()
            .filter(|(_, def)| def.value_type == ValueType::Number)
            .map(|(name, _)| *name)
            .collect()
    }

    /// All declared levels, in deterministic order.
    pub fn levels(&self) -> Vec<Level> {
        Level::ALL
            .iter()
            .copied()
            .filter(|l| self.fields.values().any(|def| def.level == *l))
            .collect()
    }
}
