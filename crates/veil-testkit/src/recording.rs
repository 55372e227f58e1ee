//! A vault client wrapper that counts calls.
//!
//! Lets tests assert things like "count with zero matches performs no
//! vault traffic" without reaching into the vault itself.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use veil_core::{FieldValue, Level, PrincipalId};
use veil_vault::{VaultClient, VaultClientError};

/// Wraps any vault client and records how many puts/gets went through.
pub struct RecordingVaultClient<C> {
    inner: C,
    puts: AtomicUsize,
    gets: AtomicUsize,
}

impl<C> RecordingVaultClient<C> {
    /// Wrap a client.
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            puts: AtomicUsize::new(0),
            gets: AtomicUsize::new(0),
        }
    }

    /// Number of put calls observed.
    pub fn put_calls(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    /// Number of get calls observed.
    pub fn get_calls(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<C: VaultClient> VaultClient for RecordingVaultClient<C> {
    async fn put(
        &self,
        principal: &PrincipalId,
        fields: &BTreeMap<String, FieldValue>,
    ) -> Result<Vec<Level>, VaultClientError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.inner.put(principal, fields).await
    }

    async fn get(
        &self,
        principal: &PrincipalId,
        level: Level,
    ) -> Result<BTreeMap<String, FieldValue>, VaultClientError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(principal, level).await
    }
}
