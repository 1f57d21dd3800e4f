//! Write-through cache of selector sets over a key-value backend

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};

use crate::config::EngineConfig;
use crate::error::{Result, SelectorError};
use crate::page::domain_from_url;
use crate::selector_set::{selector_key, SelectorSet};
use crate::types::PageKind;

pub const DEFAULT_STORAGE_PREFIX: &str = "selectorSets.";

/// Persistence backend. Implementations are swappable.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>>;
    async fn set(&self, key: &str, value: Value) -> Result<()>;
}

/// In-process backend
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct CacheState {
    sets: HashMap<String, SelectorSet>,
    /// Saves seen per key during this process
    revisions: HashMap<String, u64>,
}

/// Selector sets keyed by (domain, page kind).
///
/// A cache miss reads the backend and fills the cache under one lock, so
/// concurrent misses for a key cost a single backend read. Saves take the same
/// lock, which keeps the backend and the cache in agreement.
pub struct SelectorRepository<S> {
    store: S,
    prefix: String,
    cache: Mutex<CacheState>,
}

impl<S: KeyValueStore> SelectorRepository<S> {
    pub fn new(store: S) -> Self {
        Self::with_prefix(store, DEFAULT_STORAGE_PREFIX)
    }

    pub fn with_prefix(store: S, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            cache: Mutex::new(CacheState::default()),
        }
    }

    pub fn from_config(store: S, config: &EngineConfig) -> Self {
        Self::with_prefix(store, config.storage_prefix.clone())
    }

    pub fn key(domain: &str, page_kind: PageKind) -> String {
        selector_key(domain, page_kind)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn storage_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Persist `set`, then cache it. False when serialization or the write fails.
    pub async fn save(&self, set: &SelectorSet) -> bool {
        let key = set.key();
        let record = match set.to_record() {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Failed to serialize selector set");
                return false;
            }
        };

        let mut cache = self.cache.lock().await;
        if let Err(e) = self.store.set(&self.storage_key(&key), record).await {
            tracing::warn!(key = %key, error = %e, "Failed to persist selector set");
            return false;
        }

        *cache.revisions.entry(key.clone()).or_insert(0) += 1;
        cache.sets.insert(key.clone(), set.clone());
        tracing::debug!(key = %key, fields = set.fields().count(), "Selector set saved");
        true
    }

    pub async fn get(&self, domain: &str, page_kind: PageKind) -> Option<SelectorSet> {
        let key = Self::key(domain, page_kind);
        let mut cache = self.cache.lock().await;
        if let Some(set) = cache.sets.get(&key) {
            return Some(set.clone());
        }

        let record = match self.store.get(&self.storage_key(&key)).await {
            Ok(Some(record)) => record,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Failed to read selector set");
                return None;
            }
        };

        match SelectorSet::from_record(record) {
            Ok(set) => {
                cache.sets.insert(key, set.clone());
                Some(set)
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Stored selector set is malformed");
                None
            }
        }
    }

    /// Look up the set for the domain of `url`. A malformed URL maps to the
    /// empty domain rather than an error.
    pub async fn get_for_page(&self, url: &str, page_kind: PageKind) -> Option<SelectorSet> {
        self.get(&domain_from_url(url), page_kind).await
    }

    /// Number of saves seen for the key since this repository was created
    pub async fn revision(&self, domain: &str, page_kind: PageKind) -> u64 {
        let key = Self::key(domain, page_kind);
        self.cache
            .lock()
            .await
            .revisions
            .get(&key)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl<T: KeyValueStore + ?Sized> KeyValueStore for std::sync::Arc<T> {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        (**self).set(key, value).await
    }
}

/// Backend that refuses every operation; handy when persistence is switched off
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledStore;

#[async_trait]
impl KeyValueStore for DisabledStore {
    async fn get(&self, _key: &str) -> Result<Option<Value>> {
        Err(SelectorError::Storage("persistence disabled".to_string()))
    }

    async fn set(&self, _key: &str, _value: Value) -> Result<()> {
        Err(SelectorError::Storage("persistence disabled".to_string()))
    }
}
