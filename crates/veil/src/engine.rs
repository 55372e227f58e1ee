//! The engine: access-controlled search over the split PII
//! representation.
//!
//! A search runs validation, then authorization, then a typed query plan
//! against the hash index, and only then touches the vault for the
//! principals that matched. The engine performs no local writes on the
//! query path, so a vault failure simply aborts the read.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use veil_core::{
    FieldCatalog, FieldValue, Level, PrincipalId, QueryPlan, Scope, Tokenizer,
};
use veil_store::Store;
use veil_vault::{VaultClient, VaultClientError};

use crate::error::{AggregateFieldError, DeniedField, EngineError, Result};
use crate::request::{
    Operation, RecordView, SearchRequest, SearchResponse, SearchResults,
};
use crate::resolver;

/// Engine configuration, fixed at construction.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// The baseline capability a caller needs to invoke search at all,
    /// independent of which fields the search touches.
    pub baseline_search_scopes: Vec<Scope>,

    /// Bound on identifier sampling attempts during onboarding.
    pub max_id_attempts: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            baseline_search_scopes: vec![
                Scope::read("identity", "firstname"),
                Scope::read("identity", "lastname"),
                Scope::read("residence", "pincode"),
            ],
            max_id_attempts: 16,
        }
    }
}

/// The engine over some store and vault client.
///
/// The catalog and tokenizer are built once at process start and shared
/// by reference; everything else is reached per request.
pub struct Engine<S: Store, V: VaultClient> {
    catalog: Arc<FieldCatalog>,
    tokenizer: Arc<dyn Tokenizer>,
    store: Arc<S>,
    vault: Arc<V>,
    config: EngineConfig,
}

impl<S: Store, V: VaultClient> Engine<S, V> {
    /// Create a new engine instance.
    pub fn new(
        catalog: Arc<FieldCatalog>,
        tokenizer: Arc<dyn Tokenizer>,
        store: S,
        vault: V,
        config: EngineConfig,
    ) -> Self {
        Self {
            catalog,
            tokenizer,
            store: Arc::new(store),
            vault: Arc::new(vault),
            config,
        }
    }

    /// The field catalog this engine was built with.
    pub fn catalog(&self) -> &FieldCatalog {
        &self.catalog
    }

    /// The blind-index tokenizer this engine was built with.
    pub fn tokenizer(&self) -> &dyn Tokenizer {
        self.tokenizer.as_ref()
    }

    /// The store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The vault client reference.
    pub fn vault(&self) -> &V {
        &self.vault
    }

    pub(crate) fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Resolve a principal's effective scopes.
    pub async fn resolve_scopes(&self, id: &PrincipalId) -> Result<veil_core::ScopeSet> {
        resolver::resolve_scopes(self.store.as_ref(), id).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Search
    // ─────────────────────────────────────────────────────────────────────────

    /// Authorize and execute a search request.
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        // Validation runs before any store access.
        let operation = Operation::parse(&request.search.operation)?;

        if operation.is_aggregate() {
            self.validate_aggregate_fields(operation, &request.search.operation_fields)?;
        }

        if request.search.fields.is_empty() {
            // An empty predicate list would make the per-entity fold
            // meaningless; it is rejected rather than interpreted as
            // match-all.
            return Err(EngineError::Validation(
                "search requires at least one predicate field".to_string(),
            ));
        }
        for predicate in &request.search.fields {
            if predicate.value.to_vec().is_empty() {
                return Err(EngineError::Validation(format!(
                    "predicate on {} carries no literal values",
                    predicate.name
                )));
            }
        }

        // Authorization: baseline capability, then per-field scopes.
        let caller_scopes = self.resolve_scopes(&request.principal_id).await?;

        let missing_scopes: Vec<String> = self
            .config
            .baseline_search_scopes
            .iter()
            .filter(|scope| !caller_scopes.allows(scope))
            .map(|scope| scope.to_string())
            .collect();
        if !missing_scopes.is_empty() {
            return Err(EngineError::MissingScopes { missing_scopes });
        }

        let mut denied_fields = Vec::new();
        let mut allowed: Vec<(String, Vec<FieldValue>)> = Vec::new();
        for predicate in &request.search.fields {
            match self.catalog.lookup(&predicate.name) {
                None => denied_fields.push(DeniedField {
                    field: predicate.name.clone(),
                    required_scope: format!("unknown:read:{}", predicate.name),
                }),
                Some(def) => {
                    let required = Scope::read(def.level.as_str(), &predicate.name);
                    if caller_scopes.allows(&required) {
                        allowed.push((predicate.name.clone(), predicate.value.to_vec()));
                    } else {
                        denied_fields.push(DeniedField {
                            field: predicate.name.clone(),
                            required_scope: required.to_string(),
                        });
                    }
                }
            }
        }
        if !denied_fields.is_empty() {
            return Err(EngineError::FieldsDenied { denied_fields });
        }

        // Plan and execute against the hash index.
        let plan = QueryPlan::build(
            &self.catalog,
            self.tokenizer.as_ref(),
            &allowed,
            request.search.where_operation,
        )
        .map_err(|e| EngineError::Validation(e.to_string()))?;

        let matches = self.execute_plan(&plan).await?;

        if matches.is_empty() {
            return Ok(SearchResponse {
                message: "No matching records found".to_string(),
                results: match operation {
                    Operation::Count => SearchResults::Count(0),
                    Operation::Query => SearchResults::Records(Vec::new()),
                    Operation::Sum | Operation::Avg => SearchResults::Aggregates(
                        request
                            .search
                            .operation_fields
                            .iter()
                            .map(|field| (field.clone(), None))
                            .collect(),
                    ),
                },
            });
        }

        match operation {
            Operation::Count => Ok(SearchResponse {
                message: "Count operation completed successfully".to_string(),
                results: SearchResults::Count(matches.len() as u64),
            }),
            Operation::Query => {
                let requested = dedup_names(allowed.iter().map(|(name, _)| name.clone()));
                let mut records = Vec::with_capacity(matches.len());
                for id in &matches {
                    records.push(self.decrypted_record(id, &requested).await?);
                }
                Ok(SearchResponse {
                    message: "Query completed successfully".to_string(),
                    results: SearchResults::Records(records),
                })
            }
            Operation::Sum | Operation::Avg => {
                let fields = &request.search.operation_fields;
                let mut rows = Vec::with_capacity(matches.len());
                for id in &matches {
                    rows.push(self.decrypted_record(id, fields).await?);
                }

                let aggregates = fields
                    .iter()
                    .map(|field| {
                        let values: Vec<f64> = rows
                            .iter()
                            .filter_map(|row| row.fields.get(field))
                            .filter_map(FieldValue::as_number)
                            .collect();

                        let result = if values.is_empty() {
                            // Zero surviving numeric values is null, never 0.
                            None
                        } else {
                            let total: f64 = values.iter().sum();
                            Some(match operation {
                                Operation::Avg => total / values.len() as f64,
                                _ => total,
                            })
                        };
                        (field.clone(), result)
                    })
                    .collect();

                Ok(SearchResponse {
                    message: format!(
                        "{} operation completed successfully",
                        operation.as_str()
                    ),
                    results: SearchResults::Aggregates(aggregates),
                })
            }
        }
    }

    /// Validate aggregate field selection for sum/avg.
    fn validate_aggregate_fields(&self, operation: Operation, fields: &[String]) -> Result<()> {
        if fields.is_empty() {
            return Err(EngineError::MissingAggregateFields {
                operation: operation.as_str(),
                available_numeric_fields: self
                    .catalog
                    .numeric_fields()
                    .iter()
                    .map(|f| f.to_string())
                    .collect(),
            });
        }

        let errors: Vec<AggregateFieldError> = fields
            .iter()
            .filter_map(|field| match self.catalog.lookup(field) {
                None => Some(AggregateFieldError {
                    field: field.clone(),
                    error: "Field does not exist".to_string(),
                    expected: None,
                    actual: None,
                    level: None,
                }),
                Some(def) if def.value_type != veil_core::ValueType::Number => {
                    Some(AggregateFieldError {
                        field: field.clone(),
                        error: format!(
                            "{} operation can only be performed on numeric fields",
                            operation.as_str()
                        ),
                        expected: Some("number"),
                        actual: Some(def.value_type.as_str().to_string()),
                        level: Some(def.level.as_str().to_string()),
                    })
                }
                Some(_) => None,
            })
            .collect();

        if !errors.is_empty() {
            return Err(EngineError::InvalidAggregateFields { errors });
        }
        Ok(())
    }

    /// Run one id-lookup per predicate group and combine the sets.
    async fn execute_plan(&self, plan: &QueryPlan) -> Result<BTreeSet<PrincipalId>> {
        let mut combined: Option<BTreeSet<PrincipalId>> = None;

        // Groups are in level order, so the merge is deterministic.
        for group in &plan.groups {
            let ids = self.store.lookup_ids(group).await?;
            combined = Some(match combined {
                None => ids,
                Some(acc) => match plan.combinator {
                    veil_core::Combinator::And => acc.intersection(&ids).cloned().collect(),
                    veil_core::Combinator::Or => acc.union(&ids).cloned().collect(),
                },
            });
        }

        Ok(combined.unwrap_or_default())
    }

    /// Fetch and merge the minimal set of vault levels covering
    /// `requested`, projected down to exactly those fields plus the id.
    async fn decrypted_record(
        &self,
        id: &PrincipalId,
        requested: &[String],
    ) -> Result<RecordView> {
        let mut levels: BTreeSet<Level> = BTreeSet::new();
        for field in requested {
            if let Some(def) = self.catalog.lookup(field) {
                levels.insert(def.level);
            }
        }

        let mut merged: BTreeMap<String, FieldValue> = BTreeMap::new();
        for level in levels {
            match self.vault.get(id, level).await {
                Ok(fields) => merged.extend(fields),
                // A principal without a blob for this level simply
                // contributes no values for its fields.
                Err(VaultClientError::NotFound { .. }) => {}
                Err(VaultClientError::Unavailable(msg)) => {
                    tracing::warn!(principal_id = %id, level = %level, "vault unreachable; aborting search");
                    return Err(EngineError::Upstream(msg));
                }
                Err(other) => return Err(EngineError::Internal(other.to_string())),
            }
        }

        merged.retain(|name, _| requested.contains(name));

        Ok(RecordView {
            principal_id: id.clone(),
            fields: merged,
        })
    }
}

/// Deduplicate while preserving first-seen order.
fn dedup_names(names: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for name in names {
        if seen.insert(name.clone()) {
            out.push(name);
        }
    }
    out
}
