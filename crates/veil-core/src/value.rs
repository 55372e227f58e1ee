//! The value model: plaintext field values, their declared types, and the
//! representations the hash index actually stores.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared type of a catalog field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    String,
    Number,
    Boolean,
    Date,
}

impl ValueType {
    /// Human-readable name, used in validation detail payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::String => "string",
            ValueType::Number => "number",
            ValueType::Boolean => "boolean",
            ValueType::Date => "date",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A plaintext field value as it appears in requests and in decrypted
/// vault payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Str(String),
    Num(f64),
    Bool(bool),
}

impl FieldValue {
    /// Coerce to a number, if the value carries one.
    ///
    /// Strings are parsed; values that fail to parse yield `None` and are
    /// discarded by aggregate operations rather than treated as zero.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Num(n) => Some(*n),
            FieldValue::Str(s) => s.trim().parse::<f64>().ok(),
            FieldValue::Bool(_) => None,
        }
    }

    /// Canonical string form, used as blind-index input for string-typed
    /// and date-typed fields.
    pub fn canonical_string(&self) -> String {
        match self {
            FieldValue::Str(s) => s.clone(),
            FieldValue::Num(n) => format_number(*n),
            FieldValue::Bool(b) => b.to_string(),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Str(s.to_string())
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        FieldValue::Num(n)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

/// Format a number without a trailing `.0` for integral values, so that
/// `30` and `30.0` digest identically.
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// What the hash index persists for a field: a one-way digest for
/// string/date fields, or the native value for number/boolean fields.
///
/// Plaintext strings never reach hashed-PII storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StoredValue {
    /// Hex-encoded blind-index digest.
    Digest(String),
    /// Native numeric value, stored unchanged so aggregation works
    /// directly against the index.
    Number(f64),
    /// Native boolean value.
    Bool(bool),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_number_coercion() {
        assert_eq!(FieldValue::Num(4.5).as_number(), Some(4.5));
        assert_eq!(FieldValue::from("42").as_number(), Some(42.0));
        assert_eq!(FieldValue::from(" 7 ").as_number(), Some(7.0));
        assert_eq!(FieldValue::from("not a number").as_number(), None);
        assert_eq!(FieldValue::Bool(true).as_number(), None);
    }

    #[test]
    fn test_canonical_string_integral_number() {
        assert_eq!(FieldValue::Num(30.0).canonical_string(), "30");
        assert_eq!(FieldValue::Num(30.5).canonical_string(), "30.5");
    }

    #[test]
    fn test_field_value_untagged_json() {
        let v: FieldValue = serde_json::from_str("\"Alice\"").unwrap();
        assert_eq!(v, FieldValue::from("Alice"));
        let v: FieldValue = serde_json::from_str("25").unwrap();
        assert_eq!(v, FieldValue::Num(25.0));
        let v: FieldValue = serde_json::from_str("true").unwrap();
        assert_eq!(v, FieldValue::Bool(true));
    }
}
