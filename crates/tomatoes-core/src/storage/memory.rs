//! In-memory counter store for tests and ephemeral sessions.

use std::collections::BTreeMap;
use std::sync::Mutex;

use super::{Batch, CounterStore, Key};
use crate::error::StoreError;

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with raw values.
    pub fn with_entries<I, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (Key, V)>,
        V: ToString,
    {
        let map = entries
            .into_iter()
            .map(|(k, v)| (k.as_str().to_string(), v.to_string()))
            .collect();
        Self {
            entries: Mutex::new(map),
        }
    }

    /// Copy of every stored entry.
    pub fn dump(&self) -> BTreeMap<String, String> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }
}

impl CounterStore for MemoryStore {
    fn get(&self, key: Key) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock().map_err(|_| StoreError::Locked)?;
        Ok(entries.get(key.as_str()).cloned())
    }

    fn transact(
        &self,
        body: &mut dyn FnMut(&mut Batch) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Locked)?;
        let mut batch = Batch::new(entries.clone());
        body(&mut batch)?;
        for (key, value) in batch.into_staged() {
            match value {
                Some(value) => {
                    entries.insert(key, value);
                }
                None => {
                    entries.remove(&key);
                }
            }
        }
        Ok(())
    }
}
