//! `MemoryStore`: a lock-guarded key space of strings, sets and maps.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;
use tracing::debug;

use crate::errors::StoreError;
use crate::interfaces::IdentityStore;
use crate::types::{StoreTransaction, TransactionOp};
use catalog_indexer_shared::{Entry, EntryId};

#[derive(Debug, Clone)]
enum Value {
    String(String),
    Set(HashSet<EntryId>),
    Map(HashMap<EntryId, Entry>),
}

type KeySpace = HashMap<String, Value>;

/// Identity store kept entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    keys: Mutex<KeySpace>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn set_ref<'a>(keys: &'a KeySpace, key: &str) -> Result<Option<&'a HashSet<EntryId>>, StoreError> {
        match keys.get(key) {
            None => Ok(None),
            Some(Value::Set(set)) => Ok(Some(set)),
            Some(_) => Err(StoreError::wrong_type(key, "set")),
        }
    }

    fn set_mut<'a>(keys: &'a mut KeySpace, key: &str) -> Result<&'a mut HashSet<EntryId>, StoreError> {
        let value = keys
            .entry(key.to_string())
            .or_insert_with(|| Value::Set(HashSet::new()));

        match value {
            Value::Set(set) => Ok(set),
            _ => Err(StoreError::wrong_type(key, "set")),
        }
    }

    fn map_mut<'a>(
        keys: &'a mut KeySpace,
        key: &str,
    ) -> Result<&'a mut HashMap<EntryId, Entry>, StoreError> {
        let value = keys
            .entry(key.to_string())
            .or_insert_with(|| Value::Map(HashMap::new()));

        match value {
            Value::Map(map) => Ok(map),
            _ => Err(StoreError::wrong_type(key, "map")),
        }
    }

    /// Check that every rename source exists at the point it runs.
    fn validate(keys: &KeySpace, transaction: &StoreTransaction) -> Result<(), StoreError> {
        let mut overlay: HashMap<&str, bool> = HashMap::new();
        let exists = |overlay: &HashMap<&str, bool>, key: &str| {
            overlay
                .get(key)
                .copied()
                .unwrap_or_else(|| keys.contains_key(key))
        };

        for op in transaction.ops() {
            match op {
                TransactionOp::Rename { from, to } => {
                    if !exists(&overlay, from) {
                        return Err(StoreError::no_such_key(from.clone()));
                    }
                    overlay.insert(from.as_str(), false);
                    overlay.insert(to.as_str(), true);
                }
                TransactionOp::Delete { key } => {
                    overlay.insert(key.as_str(), false);
                }
            }
        }

        Ok(())
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.keys.lock().await.contains_key(key))
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.keys.lock().await.remove(key);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self.keys.lock().await.get(key) {
            None => Ok(None),
            Some(Value::String(value)) => Ok(Some(value.clone())),
            Some(_) => Err(StoreError::wrong_type(key, "string")),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.keys
            .lock()
            .await
            .insert(key.to_string(), Value::String(value.to_string()));
        Ok(())
    }

    async fn create_set(&self, key: &str) -> Result<(), StoreError> {
        self.keys
            .lock()
            .await
            .insert(key.to_string(), Value::Set(HashSet::new()));
        Ok(())
    }

    async fn set_add(&self, key: &str, ids: &[EntryId]) -> Result<u64, StoreError> {
        let mut keys = self.keys.lock().await;
        let set = Self::set_mut(&mut keys, key)?;

        let added = ids.iter().filter(|id| set.insert((*id).clone())).count();
        Ok(added as u64)
    }

    async fn set_card(&self, key: &str) -> Result<u64, StoreError> {
        let keys = self.keys.lock().await;
        Ok(Self::set_ref(&keys, key)?.map_or(0, |set| set.len() as u64))
    }

    async fn set_members(&self, key: &str) -> Result<Vec<EntryId>, StoreError> {
        let keys = self.keys.lock().await;
        Ok(Self::set_ref(&keys, key)?
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn set_pop(&self, key: &str, count: usize) -> Result<Vec<EntryId>, StoreError> {
        let mut keys = self.keys.lock().await;

        let set = match keys.get_mut(key) {
            None => return Ok(Vec::new()),
            Some(Value::Set(set)) => set,
            Some(_) => return Err(StoreError::wrong_type(key, "set")),
        };

        let popped: Vec<EntryId> = set.iter().take(count).cloned().collect();
        for id in &popped {
            set.remove(id);
        }

        debug!(key = %key, count = popped.len(), "Popped identities");
        Ok(popped)
    }

    async fn diff_store(
        &self,
        destination: &str,
        from: &str,
        minus: &str,
    ) -> Result<u64, StoreError> {
        let mut keys = self.keys.lock().await;

        let difference: HashSet<EntryId> = {
            let empty = HashSet::new();
            let from_set = Self::set_ref(&keys, from)?.unwrap_or(&empty);
            let minus_set = Self::set_ref(&keys, minus)?.unwrap_or(&empty);
            from_set.difference(minus_set).cloned().collect()
        };

        let cardinality = difference.len() as u64;
        keys.insert(destination.to_string(), Value::Set(difference));

        Ok(cardinality)
    }

    async fn map_put(&self, key: &str, entries: &[Entry]) -> Result<(), StoreError> {
        let mut keys = self.keys.lock().await;
        let map = Self::map_mut(&mut keys, key)?;

        for entry in entries {
            map.insert(entry.id(), entry.clone());
        }

        Ok(())
    }

    async fn map_get_many(
        &self,
        key: &str,
        ids: &[EntryId],
    ) -> Result<Vec<Option<Entry>>, StoreError> {
        let keys = self.keys.lock().await;

        match keys.get(key) {
            None => Ok(vec![None; ids.len()]),
            Some(Value::Map(map)) => Ok(ids.iter().map(|id| map.get(id).cloned()).collect()),
            Some(_) => Err(StoreError::wrong_type(key, "map")),
        }
    }

    async fn map_remove(&self, key: &str, ids: &[EntryId]) -> Result<(), StoreError> {
        let mut keys = self.keys.lock().await;

        match keys.get_mut(key) {
            None => Ok(()),
            Some(Value::Map(map)) => {
                for id in ids {
                    map.remove(id);
                }
                Ok(())
            }
            Some(_) => Err(StoreError::wrong_type(key, "map")),
        }
    }

    async fn map_retain(&self, key: &str, set_key: &str) -> Result<u64, StoreError> {
        let mut keys = self.keys.lock().await;

        let members = Self::set_ref(&keys, set_key)?.cloned().unwrap_or_default();
        match keys.get_mut(key) {
            None => Ok(0),
            Some(Value::Map(map)) => {
                let before = map.len();
                map.retain(|id, _| members.contains(id));
                Ok((before - map.len()) as u64)
            }
            Some(_) => Err(StoreError::wrong_type(key, "map")),
        }
    }

    async fn exec(&self, transaction: StoreTransaction) -> Result<(), StoreError> {
        let mut keys = self.keys.lock().await;

        Self::validate(&keys, &transaction)?;

        for op in transaction.ops() {
            match op {
                TransactionOp::Rename { from, to } => {
                    if let Some(value) = keys.remove(from) {
                        keys.insert(to.clone(), value);
                    }
                }
                TransactionOp::Delete { key } => {
                    keys.remove(key);
                }
            }
        }

        debug!(ops = transaction.ops().len(), "Executed store transaction");
        Ok(())
    }
}
