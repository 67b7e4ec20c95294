//! Outbound ports for the payload store.
//!
//! Persistence mechanics are a host concern. The service only requires a
//! keyed byte store; production hosts back it with their database of
//! choice, tests use the in-memory adapter below.

use std::collections::BTreeMap;

use thiserror::Error;

/// Key-value backend errors.
#[derive(Debug, Error)]
pub enum KvStoreError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("backend i/o error: {0}")]
    Io(String),
}

/// Abstract keyed byte storage.
///
/// Keys are opaque byte strings; iteration order for `prefix_scan` must be
/// deterministic (lexicographic by key) because paging cursors depend on
/// it.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KvStoreError>;

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), KvStoreError>;

    fn delete(&mut self, key: &[u8]) -> Result<(), KvStoreError>;

    fn exists(&self, key: &[u8]) -> Result<bool, KvStoreError>;

    /// All entries whose key starts with `prefix`, in lexicographic key
    /// order.
    fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, KvStoreError>;
}

/// In-memory key-value store for unit tests and ephemeral nodes.
///
/// A `BTreeMap` keeps prefix scans lexicographic without extra sorting.
#[derive(Debug, Default)]
pub struct InMemoryKvStore {
    data: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl InMemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for InMemoryKvStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KvStoreError> {
        Ok(self.data.get(key).cloned())
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), KvStoreError> {
        self.data.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), KvStoreError> {
        self.data.remove(key);
        Ok(())
    }

    fn exists(&self, key: &[u8]) -> Result<bool, KvStoreError> {
        Ok(self.data.contains_key(key))
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, KvStoreError> {
        Ok(self
            .data
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}
