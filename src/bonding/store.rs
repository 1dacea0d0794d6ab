//! Metadata store collaborator.
//!
//! One hash map of string fields per key, the shape of a Redis hash. The
//! engine only needs the operations below; production validators back them
//! with their key-value server, tests and single-process runs use
//! [`MemoryStore`].

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::core::errors::{StoreError, StoreResult};

pub trait MetadataStore: Send + Sync {
    fn exists(&self, key: &str) -> StoreResult<bool>;

    fn hget(&self, key: &str, field: &str) -> StoreResult<Option<String>>;

    /// All fields of `key`; empty when the key does not exist
    fn hgetall(&self, key: &str) -> StoreResult<HashMap<String, String>>;

    fn hset(&self, key: &str, field: &str, value: &str) -> StoreResult<()>;

    fn hset_multiple(&self, key: &str, fields: &[(&str, String)]) -> StoreResult<()>;

    /// Returns whether the field existed
    fn hdel(&self, key: &str, field: &str) -> StoreResult<bool>;

    /// Atomic increment; a missing field counts as 0
    fn hincrby(&self, key: &str, field: &str, delta: i64) -> StoreResult<i64>;

    /// Several increments applied as one transaction: either every field
    /// moves or none does. Returns the updated values in input order.
    fn hincrby_multiple(&self, key: &str, deltas: &[(&str, i64)]) -> StoreResult<Vec<i64>>;

    /// Every key starting with `prefix`
    fn scan_prefix(&self, prefix: &str) -> StoreResult<Vec<String>>;
}

/// In-process store
#[derive(Debug)]
pub struct MemoryStore {
    data: RwLock<HashMap<String, HashMap<String, String>>>,
    available: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate losing the connection to the backing server
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable {
                reason: "memory store marked unavailable".to_string(),
            })
        }
    }
}

impl MetadataStore for MemoryStore {
    fn exists(&self, key: &str) -> StoreResult<bool> {
        self.check_available()?;
        Ok(self.data.read().contains_key(key))
    }

    fn hget(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
        self.check_available()?;
        Ok(self
            .data
            .read()
            .get(key)
            .and_then(|fields| fields.get(field).cloned()))
    }

    fn hgetall(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        self.check_available()?;
        Ok(self.data.read().get(key).cloned().unwrap_or_default())
    }

    fn hset(&self, key: &str, field: &str, value: &str) -> StoreResult<()> {
        self.check_available()?;
        self.data
            .write()
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
        Ok(())
    }

    fn hset_multiple(&self, key: &str, fields: &[(&str, String)]) -> StoreResult<()> {
        self.check_available()?;
        let mut data = self.data.write();
        let entry = data.entry(key.to_string()).or_default();
        for (field, value) in fields {
            entry.insert(field.to_string(), value.clone());
        }
        Ok(())
    }

    fn hdel(&self, key: &str, field: &str) -> StoreResult<bool> {
        self.check_available()?;
        Ok(self
            .data
            .write()
            .get_mut(key)
            .map_or(false, |fields| fields.remove(field).is_some()))
    }

    fn hincrby(&self, key: &str, field: &str, delta: i64) -> StoreResult<i64> {
        self.check_available()?;
        let mut data = self.data.write();
        let slot = data
            .entry(key.to_string())
            .or_default()
            .entry(field.to_string())
            .or_insert_with(|| "0".to_string());
        let current: i64 = slot.parse().map_err(|_| StoreError::Corrupt {
            key: key.to_string(),
            field: field.to_string(),
            value: slot.clone(),
        })?;
        let updated = current + delta;
        *slot = updated.to_string();
        Ok(updated)
    }

    fn hincrby_multiple(&self, key: &str, deltas: &[(&str, i64)]) -> StoreResult<Vec<i64>> {
        self.check_available()?;
        let mut data = self.data.write();
        let fields = data.entry(key.to_string()).or_default();

        let mut updated = Vec::with_capacity(deltas.len());
        for (field, delta) in deltas {
            let current = match fields.get(*field) {
                Some(value) => value.parse::<i64>().map_err(|_| StoreError::Corrupt {
                    key: key.to_string(),
                    field: field.to_string(),
                    value: value.clone(),
                })?,
                None => 0,
            };
            updated.push(current + delta);
        }
        for ((field, _), value) in deltas.iter().zip(&updated) {
            fields.insert(field.to_string(), value.to_string());
        }
        Ok(updated)
    }

    fn scan_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        self.check_available()?;
        let mut keys: Vec<String> = self
            .data
            .read()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }
}
