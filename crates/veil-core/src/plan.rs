//! The typed query plan: tokenized predicates grouped per owning level.
//!
//! The orchestrator never hands raw field lists to storage. It builds a
//! [`QueryPlan`] - one [`PredicateGroup`] per owning level, literals
//! already tokenized - and the store executes one id-lookup per group.
//! Groups are kept in level order so multi-level merges are
//! deterministic.

use serde::{Deserialize, Serialize};

use crate::catalog::{FieldCatalog, Level};
use crate::error::{CoreError, Result};
use crate::token::Tokenizer;
use crate::value::{FieldValue, StoredValue};

/// How per-level id sets are combined across levels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Combinator {
    /// Intersection of per-level results.
    #[default]
    And,
    /// Union of per-level results.
    Or,
}

/// One field's equality predicate, with literals already tokenized.
///
/// A single value means plain equality; multiple values mean
/// set-membership.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenizedPredicate {
    pub field: String,
    pub values: Vec<StoredValue>,
}

/// All predicates owned by a single level, combined with AND.
#[derive(Debug, Clone, PartialEq)]
pub struct PredicateGroup {
    pub level: Level,
    pub predicates: Vec<TokenizedPredicate>,
}

/// The complete plan for one search request.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    /// Groups in ascending level order.
    pub groups: Vec<PredicateGroup>,
    pub combinator: Combinator,
}

impl QueryPlan {
    /// Build a plan from authorized predicates.
    ///
    /// Every field must already exist in the catalog (authorization has
    /// run by the time a plan is built); literals are tokenized with the
    /// same function that wrote the index, so stored and queried
    /// representations compare directly.
    pub fn build(
        catalog: &FieldCatalog,
        tokenizer: &dyn Tokenizer,
        predicates: &[(String, Vec<FieldValue>)],
        combinator: Combinator,
    ) -> Result<QueryPlan> {
        let mut groups: Vec<PredicateGroup> = Vec::new();

        for (field, literals) in predicates {
            let def = catalog
                .lookup(field)
                .ok_or_else(|| CoreError::UnknownField(field.clone()))?;

            let values = literals
                .iter()
                .map(|literal| {
                    tokenizer
                        .tokenize(literal, def.value_type)
                        .map_err(|e| match e {
                            CoreError::TypeMismatch { expected, got, .. } => {
                                CoreError::TypeMismatch {
                                    field: field.clone(),
                                    expected,
                                    got,
                                }
                            }
                            other => other,
                        })
                })
                .collect::<Result<Vec<StoredValue>>>()?;

            match groups.iter_mut().find(|g| g.level == def.level) {
                Some(group) => group.predicates.push(TokenizedPredicate {
                    field: field.clone(),
                    values,
                }),
                None => groups.push(PredicateGroup {
                    level: def.level,
                    predicates: vec![TokenizedPredicate {
                        field: field.clone(),
                        values,
                    }],
                }),
            }
        }

        groups.sort_by_key(|g| g.level);

        Ok(QueryPlan { groups, combinator })
    }
}
