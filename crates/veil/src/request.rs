//! Logical request/response contracts, transport-agnostic.
//!
//! These are the shapes a transport adapter serializes; nothing in them
//! assumes HTTP or any particular framing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use veil_core::{Combinator, FieldValue, PrincipalClass, PrincipalId};

use crate::error::EngineError;

/// A search invocation by a caller principal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    /// The caller whose scopes authorize the search.
    pub principal_id: PrincipalId,
    pub search: SearchBody,
}

/// The search itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchBody {
    /// Equality predicates, combined per `where_operation`.
    #[serde(default)]
    pub fields: Vec<FieldPredicate>,

    /// One of `query`, `count`, `sum`, `avg`. Validated by the engine so
    /// unknown operations produce a structured error rather than a
    /// deserialization failure.
    #[serde(default = "default_operation")]
    pub operation: String,

    /// AND or OR across owning entities.
    #[serde(default, rename = "whereOperation")]
    pub where_operation: Combinator,

    /// The fields to aggregate, for sum/avg only.
    #[serde(default, rename = "operationFields")]
    pub operation_fields: Vec<String>,
}

fn default_operation() -> String {
    "query".to_string()
}

/// One field predicate: implicit equality against one or many literals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldPredicate {
    pub name: String,
    /// A single literal, or a list meaning set-membership.
    #[serde(alias = "values")]
    pub value: PredicateValues,
}

/// One-or-many predicate literals.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PredicateValues {
    One(FieldValue),
    Many(Vec<FieldValue>),
}

impl PredicateValues {
    /// Flatten to a literal list.
    pub fn to_vec(&self) -> Vec<FieldValue> {
        match self {
            PredicateValues::One(v) => vec![v.clone()],
            PredicateValues::Many(vs) => vs.clone(),
        }
    }
}

/// The validated search operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Query,
    Count,
    Sum,
    Avg,
}

impl Operation {
    /// The valid operation names, in documentation order.
    pub const VALID: [&'static str; 4] = ["query", "count", "sum", "avg"];

    /// Parse a caller-supplied operation name (case-insensitive).
    pub fn parse(s: &str) -> Result<Self, EngineError> {
        match s.to_ascii_lowercase().as_str() {
            "query" => Ok(Operation::Query),
            "count" => Ok(Operation::Count),
            "sum" => Ok(Operation::Sum),
            "avg" => Ok(Operation::Avg),
            other => Err(EngineError::InvalidOperation {
                got: other.to_string(),
                valid: Self::VALID.to_vec(),
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Query => "query",
            Operation::Count => "count",
            Operation::Sum => "sum",
            Operation::Avg => "avg",
        }
    }

    /// Whether this operation aggregates over named numeric fields.
    pub fn is_aggregate(&self) -> bool {
        matches!(self, Operation::Sum | Operation::Avg)
    }
}

/// A successful search response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub message: String,
    pub results: SearchResults,
}

/// Result payloads by operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SearchResults {
    /// `count`: cardinality of the match set.
    Count(u64),
    /// `query`: one field map per matching principal.
    Records(Vec<RecordView>),
    /// `sum`/`avg`: per-field aggregate, `null` when no numeric values
    /// survived.
    Aggregates(BTreeMap<String, Option<f64>>),
}

/// One decrypted, projected record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordView {
    pub principal_id: PrincipalId,
    #[serde(flatten)]
    pub fields: BTreeMap<String, FieldValue>,
}

/// An onboarding request: the full candidate field set plus class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnboardRequest {
    pub class: PrincipalClass,
    /// The principal's secret; only its digest is stored.
    pub credential: String,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldValue>,
}

/// A successful onboarding response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnboardResponse {
    pub message: String,
    pub principal_id: PrincipalId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_request_wire_shape() {
        let json = r#"{
            "principal_id": "1234567890",
            "search": {
                "fields": [
                    {"name": "firstname", "value": "Alice"},
                    {"name": "pincode", "values": ["560001", "560002"]}
                ],
                "operation": "query",
                "whereOperation": "OR"
            }
        }"#;

        let req: SearchRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.search.fields.len(), 2);
        assert_eq!(req.search.fields[0].value.to_vec().len(), 1);
        assert_eq!(req.search.fields[1].value.to_vec().len(), 2);
        assert_eq!(req.search.where_operation, Combinator::Or);
        assert!(req.search.operation_fields.is_empty());
    }

    #[test]
    fn test_operation_defaults_to_query() {
        let json = r#"{"principal_id": "1234567890", "search": {"fields": []}}"#;
        let req: SearchRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.search.operation, "query");
        assert_eq!(req.search.where_operation, Combinator::And);
    }

    #[test]
    fn test_operation_parse() {
        assert_eq!(Operation::parse("QUERY").unwrap(), Operation::Query);
        assert_eq!(Operation::parse("avg").unwrap(), Operation::Avg);

        let err = Operation::parse("median").unwrap_err();
        match err {
            EngineError::InvalidOperation { got, valid } => {
                assert_eq!(got, "median");
                assert_eq!(valid, Operation::VALID.to_vec());
            }
            other => panic!("expected InvalidOperation, got {other:?}"),
        }
    }

    #[test]
    fn test_record_view_flattens_fields() {
        let mut fields = BTreeMap::new();
        fields.insert("firstname".to_string(), FieldValue::from("Alice"));
        let view = RecordView {
            principal_id: PrincipalId::from("1234567890"),
            fields,
        };

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["principal_id"], "1234567890");
        assert_eq!(json["firstname"], "Alice");
    }

    #[test]
    fn test_aggregate_null_serializes_as_null() {
        let mut aggregates = BTreeMap::new();
        aggregates.insert("age".to_string(), None::<f64>);
        let results = SearchResults::Aggregates(aggregates);

        let json = serde_json::to_value(&results).unwrap();
        assert!(json["age"].is_null());
    }
}
