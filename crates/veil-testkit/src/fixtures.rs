//! Test fixtures and helpers.
//!
//! Common setup code for integration tests: an engine wired to
//! in-memory stores with ephemeral secrets.

use std::collections::BTreeMap;
use std::sync::Arc;

use veil::{
    Engine, EngineConfig, FieldPredicate, OnboardRequest, OnboardResponse, PredicateValues,
    SearchBody, SearchRequest,
};
use veil_core::{
    BlindIndexTokenizer, Combinator, FieldCatalog, FieldValue, PrincipalClass, PrincipalId,
};
use veil_store::MemoryStore;
use veil_vault::{LocalVaultClient, MemoryBlobStore, Secrets, Vault};

use crate::recording::RecordingVaultClient;

/// The engine type every fixture hands out.
pub type TestEngine =
    Engine<MemoryStore, RecordingVaultClient<LocalVaultClient<MemoryBlobStore>>>;

/// A fully wired in-memory engine with ephemeral secrets.
pub struct TestHarness {
    pub engine: TestEngine,
}

impl TestHarness {
    /// Build a harness with the default engine config.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Build a harness with a custom engine config.
    pub fn with_config(config: EngineConfig) -> Self {
        let catalog = Arc::new(FieldCatalog::builtin());
        let secrets = Secrets::ephemeral();
        let tokenizer = Arc::new(BlindIndexTokenizer::new(&secrets.index_salt));

        let vault = Vault::new(
            Arc::clone(&catalog),
            secrets.vault_key.clone(),
            secrets.vault_nonce.clone(),
            MemoryBlobStore::new(),
        );
        let client = RecordingVaultClient::new(LocalVaultClient::new(Arc::new(vault)));

        Self {
            engine: Engine::new(catalog, tokenizer, MemoryStore::new(), client, config),
        }
    }

    /// Onboard a customer with the standard field set; panics on
    /// failure, which is what a fixture should do.
    pub async fn onboard_customer(
        &self,
        firstname: &str,
        mobile: &str,
        pincode: &str,
        age: f64,
    ) -> PrincipalId {
        let response: OnboardResponse = self
            .engine
            .onboard(&OnboardRequest {
                class: PrincipalClass::Customer,
                credential: "correct horse battery staple".to_string(),
                fields: customer_fields(firstname, mobile, pincode, age),
            })
            .await
            .expect("fixture onboarding should succeed");
        response.principal_id
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// The standard full customer field set.
pub fn customer_fields(
    firstname: &str,
    mobile: &str,
    pincode: &str,
    age: f64,
) -> BTreeMap<String, FieldValue> {
    let mut fields = BTreeMap::new();
    fields.insert("firstname".to_string(), FieldValue::from(firstname));
    fields.insert("lastname".to_string(), FieldValue::from("Lovelace"));
    fields.insert("dob".to_string(), FieldValue::from("1990-04-01"));
    fields.insert("mobile".to_string(), FieldValue::from(mobile));
    fields.insert("age".to_string(), FieldValue::Num(age));
    fields.insert("address".to_string(), FieldValue::from("12 High Street"));
    fields.insert("pincode".to_string(), FieldValue::from(pincode));
    fields
}

/// A single-literal predicate.
pub fn predicate(name: &str, value: FieldValue) -> FieldPredicate {
    FieldPredicate {
        name: name.to_string(),
        value: PredicateValues::One(value),
    }
}

/// A set-membership predicate.
pub fn predicate_in(name: &str, values: Vec<FieldValue>) -> FieldPredicate {
    FieldPredicate {
        name: name.to_string(),
        value: PredicateValues::Many(values),
    }
}

/// Assemble a search request.
pub fn search_request(
    caller: &PrincipalId,
    operation: &str,
    where_operation: Combinator,
    fields: Vec<FieldPredicate>,
    operation_fields: Vec<&str>,
) -> SearchRequest {
    SearchRequest {
        principal_id: caller.clone(),
        search: SearchBody {
            fields,
            operation: operation.to_string(),
            where_operation,
            operation_fields: operation_fields.into_iter().map(String::from).collect(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_harness_onboards_and_counts_vault_puts() {
        let harness = TestHarness::new();
        let id = harness
            .onboard_customer("Ada", "9990001111", "560001", 36.0)
            .await;

        assert_eq!(id.as_str().len(), 10);
        assert_eq!(harness.engine.vault().put_calls(), 1);
        assert_eq!(harness.engine.vault().get_calls(), 0);
    }
}
