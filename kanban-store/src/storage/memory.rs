/// In-process storage backend. Nothing survives the process.
use std::collections::BTreeMap;
use std::sync::RwLock;

use serde_json::Value;

use super::{KvStore, StorageError};

#[derive(Debug, Default)]
pub struct MemoryKv {
    slots: RwLock<BTreeMap<String, Value>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seed slots, e.g. with data in an older on-disk shape.
    pub fn with_slots<I, K>(slots: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self {
            slots: RwLock::new(slots.into_iter().map(|(k, v)| (k.into(), v)).collect()),
        }
    }
}

impl KvStore for MemoryKv {
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let slots = self.slots.read().unwrap_or_else(|e| e.into_inner());
        Ok(slots.get(key).cloned())
    }

    fn set_many(&self, entries: &[(&str, Value)]) -> Result<(), StorageError> {
        let mut slots = self.slots.write().unwrap_or_else(|e| e.into_inner());
        for (key, value) in entries {
            slots.insert((*key).to_string(), value.clone());
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let slots = self.slots.read().unwrap_or_else(|e| e.into_inner());
        Ok(slots.keys().cloned().collect())
    }
}
