//! Integration tests for the ingestion pipeline.

use std::collections::BTreeMap;

use async_trait::async_trait;
use veil::{Engine, EngineConfig, EngineError, OnboardRequest};
use veil_core::{
    BlindIndexTokenizer, FieldCatalog, FieldValue, Level, PredicateGroup, PrincipalClass,
    PrincipalId, Tokenizer, TokenizedPredicate,
};
use veil_store::{MemoryStore, Store};
use veil_vault::{VaultClient, VaultClientError};
use veil_testkit::{customer_fields, TestHarness};

#[tokio::test]
async fn test_onboarded_customer_gets_wildcard_scope() {
    let harness = TestHarness::new();
    let id = harness
        .onboard_customer("Alice", "9990001111", "560001", 30.0)
        .await;

    let principal = harness
        .engine
        .store()
        .get_principal(&id)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(principal.scopes, vec!["*".to_string()]);
    assert_eq!(principal.class, PrincipalClass::Customer);
    // The credential is stored as a digest, never as the plaintext.
    assert_ne!(principal.credential_digest, "correct horse battery staple");
}

#[tokio::test]
async fn test_service_principal_starts_with_no_scopes() {
    let harness = TestHarness::new();

    let response = harness
        .engine
        .onboard(&OnboardRequest {
            class: PrincipalClass::Service,
            credential: "svc-secret".to_string(),
            fields: customer_fields("Robo", "9990005555", "560005", 1.0),
        })
        .await
        .unwrap();

    let principal = harness
        .engine
        .store()
        .get_principal(&response.principal_id)
        .await
        .unwrap()
        .unwrap();
    assert!(principal.scopes.is_empty());

    let scopes = harness
        .engine
        .resolve_scopes(&response.principal_id)
        .await
        .unwrap();
    assert!(scopes.is_empty());
}

#[tokio::test]
async fn test_duplicate_natural_key_conflicts() {
    let harness = TestHarness::new();
    harness
        .onboard_customer("Alice", "9990001111", "560001", 30.0)
        .await;

    let err = harness
        .engine
        .onboard(&OnboardRequest {
            class: PrincipalClass::Customer,
            credential: "pw".to_string(),
            // Different person, same contact number.
            fields: customer_fields("Mallory", "9990001111", "111111", 99.0),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::NaturalKeyExists));
}

#[tokio::test]
async fn test_unknown_field_and_missing_natural_key_are_validation_errors() {
    let harness = TestHarness::new();

    let mut fields = customer_fields("Alice", "9990001111", "560001", 30.0);
    fields.insert("ssn".to_string(), FieldValue::from("000-00-0000"));
    let err = harness
        .engine
        .onboard(&OnboardRequest {
            class: PrincipalClass::Customer,
            credential: "pw".to_string(),
            fields,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    let mut fields = customer_fields("Alice", "9990001111", "560001", 30.0);
    fields.remove("mobile");
    let err = harness
        .engine
        .onboard(&OnboardRequest {
            class: PrincipalClass::Customer,
            credential: "pw".to_string(),
            fields,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

/// A vault client that is permanently unreachable.
struct DownVaultClient;

#[async_trait]
impl VaultClient for DownVaultClient {
    async fn put(
        &self,
        _principal: &PrincipalId,
        _fields: &BTreeMap<String, FieldValue>,
    ) -> Result<Vec<Level>, VaultClientError> {
        Err(VaultClientError::Unavailable("connection refused".into()))
    }

    async fn get(
        &self,
        _principal: &PrincipalId,
        _level: Level,
    ) -> Result<BTreeMap<String, FieldValue>, VaultClientError> {
        Err(VaultClientError::Unavailable("connection refused".into()))
    }
}

#[tokio::test]
async fn test_vault_failure_aborts_with_no_local_state() {
    // Log output for the failure path goes through the normal
    // subscriber machinery.
    tracing_subscriber::fmt().with_test_writer().try_init().ok();

    let catalog = std::sync::Arc::new(FieldCatalog::builtin());
    let tokenizer = std::sync::Arc::new(BlindIndexTokenizer::new(
        &veil_core::IndexSalt::from_bytes([5; 32]),
    ));
    let engine = Engine::new(
        std::sync::Arc::clone(&catalog),
        tokenizer.clone(),
        MemoryStore::new(),
        DownVaultClient,
        EngineConfig::default(),
    );

    let err = engine
        .onboard(&OnboardRequest {
            class: PrincipalClass::Customer,
            credential: "pw".to_string(),
            fields: customer_fields("Alice", "9990001111", "560001", 30.0),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Upstream(_)));

    // Nothing committed locally: the natural key is still free.
    let mobile_digest = tokenizer
        .tokenize(&FieldValue::from("9990001111"), veil_core::ValueType::String)
        .unwrap();
    let ids = engine
        .store()
        .lookup_ids(&PredicateGroup {
            level: Level::Identity,
            predicates: vec![TokenizedPredicate {
                field: "mobile".to_string(),
                values: vec![mobile_digest],
            }],
        })
        .await
        .unwrap();
    assert!(ids.is_empty());
}

#[tokio::test]
async fn test_onboarding_writes_both_representations() {
    let harness = TestHarness::new();
    let id = harness
        .onboard_customer("Alice", "9990001111", "560001", 30.0)
        .await;

    // Searchable representation: the mobile digest resolves to the id.
    let mobile_digest = harness
        .engine
        .tokenizer()
        .tokenize(&FieldValue::from("9990001111"), veil_core::ValueType::String)
        .unwrap();
    let ids = harness
        .engine
        .store()
        .lookup_ids(&PredicateGroup {
            level: Level::Identity,
            predicates: vec![TokenizedPredicate {
                field: "mobile".to_string(),
                values: vec![mobile_digest],
            }],
        })
        .await
        .unwrap();
    assert!(ids.contains(&id));

    // Recoverable representation: both levels decrypt.
    let identity = harness.engine.vault().get(&id, Level::Identity).await.unwrap();
    assert_eq!(identity["mobile"], FieldValue::from("9990001111"));
    let residence = harness.engine.vault().get(&id, Level::Residence).await.unwrap();
    assert_eq!(residence["pincode"], FieldValue::from("560001"));
}
