//! In-memory backends for tests and embedding, one per family.

use std::collections::BTreeMap;
use std::sync::{Mutex, RwLock};

use crate::error::StoreResult;
use crate::kv::KvBackend;
use crate::tx::{TxBackend, TxHandle, TxOutcome};

/// In-memory key/value store with single-key atomic primitives, the
/// reference implementation of [`KvBackend`].
///
/// A `BTreeMap` behind an `RwLock`; each primitive holds the lock for its
/// whole duration, which is exactly the per-key atomicity the contract
/// requires (and nothing more).
#[derive(Default)]
pub struct InMemoryKvBackend {
    map: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl InMemoryKvBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows currently stored.
    pub fn len(&self) -> usize {
        self.map.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.read().expect("lock poisoned").is_empty()
    }
}

impl KvBackend for InMemoryKvBackend {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.map.read().expect("lock poisoned").get(key).cloned())
    }

    fn put_if_absent(&self, key: &str, value: Vec<u8>) -> StoreResult<bool> {
        let mut map = self.map.write().expect("lock poisoned");
        if map.contains_key(key) {
            return Ok(false);
        }
        map.insert(key.to_string(), value);
        Ok(true)
    }

    fn compare_and_put(&self, key: &str, expected: &[u8], value: Vec<u8>) -> StoreResult<bool> {
        let mut map = self.map.write().expect("lock poisoned");
        match map.get(key) {
            Some(current) if current == expected => {
                map.insert(key.to_string(), value);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn compare_and_delete(&self, key: &str, expected: &[u8]) -> StoreResult<bool> {
        let mut map = self.map.write().expect("lock poisoned");
        match map.get(key) {
            Some(current) if current == expected => {
                map.remove(key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn scan_prefix(&self, prefix: &str) -> StoreResult<Vec<(String, Vec<u8>)>> {
        let map = self.map.read().expect("lock poisoned");
        Ok(map
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

/// In-memory transactional store, the reference implementation of
/// [`TxBackend`].
///
/// Optimistic: a transaction records what it read; commit validates the
/// read set against the current map under one lock and applies the write
/// set only when nothing moved. Phantom reads (keys appearing under a
/// scanned prefix after the scan) are not detected, which the adapters do
/// not rely on.
#[derive(Default)]
pub struct InMemoryTxBackend {
    map: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl InMemoryTxBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TxBackend for InMemoryTxBackend {
    fn begin(&self) -> StoreResult<Box<dyn TxHandle + '_>> {
        Ok(Box::new(InMemoryTx {
            backend: self,
            reads: Vec::new(),
            writes: BTreeMap::new(),
        }))
    }
}

struct InMemoryTx<'a> {
    backend: &'a InMemoryTxBackend,
    /// Keys read from committed state and the values observed.
    reads: Vec<(String, Option<Vec<u8>>)>,
    /// Staged writes; `None` stages a delete.
    writes: BTreeMap<String, Option<Vec<u8>>>,
}

impl TxHandle for InMemoryTx<'_> {
    fn get(&mut self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        if let Some(staged) = self.writes.get(key) {
            return Ok(staged.clone());
        }
        let value = self
            .backend
            .map
            .lock()
            .expect("lock poisoned")
            .get(key)
            .cloned();
        self.reads.push((key.to_string(), value.clone()));
        Ok(value)
    }

    fn put(&mut self, key: &str, value: Vec<u8>) {
        self.writes.insert(key.to_string(), Some(value));
    }

    fn delete(&mut self, key: &str) {
        self.writes.insert(key.to_string(), None);
    }

    fn scan_prefix(&mut self, prefix: &str) -> StoreResult<Vec<(String, Vec<u8>)>> {
        let committed: Vec<(String, Vec<u8>)> = {
            let map = self.backend.map.lock().expect("lock poisoned");
            map.range(prefix.to_string()..)
                .take_while(|(k, _)| k.starts_with(prefix))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        };
        let mut merged: BTreeMap<String, Vec<u8>> = BTreeMap::new();
        for (key, value) in committed {
            self.reads.push((key.clone(), Some(value.clone())));
            merged.insert(key, value);
        }
        for (key, staged) in &self.writes {
            if !key.starts_with(prefix) {
                continue;
            }
            match staged {
                Some(value) => {
                    merged.insert(key.clone(), value.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }
        Ok(merged.into_iter().collect())
    }

    fn commit(self: Box<Self>) -> StoreResult<TxOutcome> {
        let mut map = self.backend.map.lock().expect("lock poisoned");
        for (key, observed) in &self.reads {
            if map.get(key) != observed.as_ref() {
                return Ok(TxOutcome::Conflict);
            }
        }
        for (key, staged) in self.writes {
            match staged {
                Some(value) => {
                    map.insert(key, value);
                }
                None => {
                    map.remove(&key);
                }
            }
        }
        Ok(TxOutcome::Committed)
    }
}
