//! Transaction store service.

use parking_lot::RwLock;
use shared_types::{PublicKey, TxHash};
use tracing::{debug, warn};

use crate::domain::errors::StoreError;
use crate::domain::record::{PutOutcome, RecordStatus, ResendCursor, StoredRecord};
use crate::ports::KeyValueStore;

const TX_PREFIX: &[u8] = b"tx:";
const CURSOR_PREFIX: &[u8] = b"cursor:";
const SCHEMA_KEY: &[u8] = b"meta:schema";
const SCHEMA_VERSION: &[u8] = b"1";

/// DAO-like interface the rest of the node consumes.
///
/// All operations are keyed by content address. `put` of an existing hash
/// is a no-op equality check; records are immutable apart from their
/// status field.
pub trait TransactionStore: Send + Sync {
    /// Persist a record. Returns [`PutOutcome::AlreadyPresent`] without
    /// touching storage when the hash already exists with equal bytes.
    fn put(&self, hash: &TxHash, record: StoredRecord) -> Result<PutOutcome, StoreError>;

    /// Fetch a record; `Ok(None)` distinguishes absent from error.
    fn get(&self, hash: &TxHash) -> Result<Option<StoredRecord>, StoreError>;

    fn exists(&self, hash: &TxHash) -> Result<bool, StoreError>;

    /// Update the status of an existing record.
    fn set_status(&self, hash: &TxHash, status: RecordStatus) -> Result<(), StoreError>;

    /// Of the hashes a peer claims to know, those absent locally.
    fn list_missing(&self, peer_known: &[TxHash]) -> Result<Vec<TxHash>, StoreError>;

    /// Deterministic page of locally stored hashes (lexicographic order).
    fn hashes_page(&self, offset: u64, limit: usize) -> Result<Vec<TxHash>, StoreError>;

    /// Hashes of records still gated on missing dependencies.
    fn awaiting_dependencies(&self) -> Result<Vec<TxHash>, StoreError>;

    fn count(&self) -> Result<u64, StoreError>;

    fn cursor(&self, peer: &PublicKey) -> Result<Option<ResendCursor>, StoreError>;

    fn save_cursor(&self, peer: &PublicKey, cursor: ResendCursor) -> Result<(), StoreError>;

    fn clear_cursor(&self, peer: &PublicKey) -> Result<(), StoreError>;

    /// Store health verification. Returns `false` rather than erroring so
    /// callers decide whether to abort startup.
    fn upcheck(&self) -> bool;
}

/// [`TransactionStore`] implementation over a [`KeyValueStore`] backend.
pub struct PayloadStore<K: KeyValueStore> {
    kv: RwLock<K>,
}

impl<K: KeyValueStore> PayloadStore<K> {
    pub fn new(kv: K) -> Self {
        Self {
            kv: RwLock::new(kv),
        }
    }

    fn tx_key(hash: &TxHash) -> Vec<u8> {
        let mut key = TX_PREFIX.to_vec();
        key.extend_from_slice(hash.as_bytes());
        key
    }

    fn cursor_key(peer: &PublicKey) -> Vec<u8> {
        let mut key = CURSOR_PREFIX.to_vec();
        key.extend_from_slice(peer.as_bytes());
        key
    }

    fn decode_record(hash: &TxHash, bytes: &[u8]) -> Result<StoredRecord, StoreError> {
        bincode::deserialize(bytes).map_err(|e| StoreError::Corrupt(*hash, e.to_string()))
    }

    fn hash_from_key(key: &[u8]) -> Option<TxHash> {
        TxHash::from_slice(key.strip_prefix(TX_PREFIX)?).ok()
    }
}

impl<K: KeyValueStore> TransactionStore for PayloadStore<K> {
    fn put(&self, hash: &TxHash, record: StoredRecord) -> Result<PutOutcome, StoreError> {
        let key = Self::tx_key(hash);
        let mut kv = self.kv.write();
        if let Some(existing) = kv.get(&key)? {
            let existing = Self::decode_record(hash, &existing)?;
            if existing.payload == record.payload {
                debug!(%hash, "record already present, put is a no-op");
                return Ok(PutOutcome::AlreadyPresent);
            }
            return Err(StoreError::ContentMismatch(*hash));
        }
        let bytes =
            bincode::serialize(&record).map_err(|e| StoreError::Corrupt(*hash, e.to_string()))?;
        kv.put(&key, &bytes)?;
        Ok(PutOutcome::Stored)
    }

    fn get(&self, hash: &TxHash) -> Result<Option<StoredRecord>, StoreError> {
        match self.kv.read().get(&Self::tx_key(hash))? {
            Some(bytes) => Ok(Some(Self::decode_record(hash, &bytes)?)),
            None => Ok(None),
        }
    }

    fn exists(&self, hash: &TxHash) -> Result<bool, StoreError> {
        Ok(self.kv.read().exists(&Self::tx_key(hash))?)
    }

    fn set_status(&self, hash: &TxHash, status: RecordStatus) -> Result<(), StoreError> {
        let key = Self::tx_key(hash);
        let mut kv = self.kv.write();
        let bytes = kv.get(&key)?.ok_or(StoreError::NotFound(*hash))?;
        let record = Self::decode_record(hash, &bytes)?.with_status(status);
        let bytes =
            bincode::serialize(&record).map_err(|e| StoreError::Corrupt(*hash, e.to_string()))?;
        kv.put(&key, &bytes)?;
        Ok(())
    }

    fn list_missing(&self, peer_known: &[TxHash]) -> Result<Vec<TxHash>, StoreError> {
        let kv = self.kv.read();
        let mut missing = Vec::new();
        for hash in peer_known {
            if !kv.exists(&Self::tx_key(hash))? {
                missing.push(*hash);
            }
        }
        Ok(missing)
    }

    fn hashes_page(&self, offset: u64, limit: usize) -> Result<Vec<TxHash>, StoreError> {
        let kv = self.kv.read();
        let entries = kv.prefix_scan(TX_PREFIX)?;
        Ok(entries
            .iter()
            .skip(offset as usize)
            .take(limit)
            .filter_map(|(k, _)| Self::hash_from_key(k))
            .collect())
    }

    fn awaiting_dependencies(&self) -> Result<Vec<TxHash>, StoreError> {
        let kv = self.kv.read();
        let mut gated = Vec::new();
        for (key, value) in kv.prefix_scan(TX_PREFIX)? {
            let Some(hash) = Self::hash_from_key(&key) else {
                warn!("skipping malformed store key");
                continue;
            };
            let record = Self::decode_record(&hash, &value)?;
            if record.status == RecordStatus::AwaitingDependencies {
                gated.push(hash);
            }
        }
        Ok(gated)
    }

    fn count(&self) -> Result<u64, StoreError> {
        Ok(self.kv.read().prefix_scan(TX_PREFIX)?.len() as u64)
    }

    fn cursor(&self, peer: &PublicKey) -> Result<Option<ResendCursor>, StoreError> {
        match self.kv.read().get(&Self::cursor_key(peer))? {
            Some(bytes) => {
                let cursor = bincode::deserialize(&bytes)
                    .map_err(|e| StoreError::CorruptCursor(e.to_string()))?;
                Ok(Some(cursor))
            }
            None => Ok(None),
        }
    }

    fn save_cursor(&self, peer: &PublicKey, cursor: ResendCursor) -> Result<(), StoreError> {
        let bytes = bincode::serialize(&cursor)
            .map_err(|e| StoreError::CorruptCursor(e.to_string()))?;
        self.kv.write().put(&Self::cursor_key(peer), &bytes)?;
        Ok(())
    }

    fn clear_cursor(&self, peer: &PublicKey) -> Result<(), StoreError> {
        self.kv.write().delete(&Self::cursor_key(peer))?;
        Ok(())
    }

    fn upcheck(&self) -> bool {
        let mut kv = self.kv.write();
        match kv.get(SCHEMA_KEY) {
            Ok(Some(version)) => version == SCHEMA_VERSION,
            Ok(None) => kv.put(SCHEMA_KEY, SCHEMA_VERSION).is_ok(),
            Err(e) => {
                warn!("store upcheck failed: {e}");
                false
            }
        }
    }
}
