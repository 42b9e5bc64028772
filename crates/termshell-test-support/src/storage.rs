//! In-memory `KeyValueStore`.

use std::collections::BTreeMap;
use std::sync::Mutex;

use termshell_core::error::ShellError;
use termshell_core::storage::KeyValueStore;

/// A store that keeps everything in a map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<BTreeMap<String, serde_json::Value>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored keys, sorted.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.values.lock().unwrap().keys().cloned().collect()
    }
}

impl KeyValueStore for MemoryStore {
    fn save(&self, key: &str, value: &serde_json::Value) -> Result<(), ShellError> {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_owned(), value.clone());
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Option<serde_json::Value>, ShellError> {
        Ok(self.values.lock().unwrap().get(key).cloned())
    }

    fn remove(&self, key: &str) -> Result<(), ShellError> {
        self.values.lock().unwrap().remove(key);
        Ok(())
    }

    fn has(&self, key: &str) -> bool {
        self.values.lock().unwrap().contains_key(key)
    }

    fn clear(&self) -> Result<(), ShellError> {
        self.values.lock().unwrap().clear();
        Ok(())
    }
}
