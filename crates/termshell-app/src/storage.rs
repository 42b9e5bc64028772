//! JSON file key/value store.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use termshell_core::error::ShellError;
use termshell_core::storage::KeyValueStore;
use tracing::debug;

use crate::error::AppError;

/// A [`KeyValueStore`] persisted as one JSON object on disk.
///
/// Values are cached in memory; every mutation rewrites the whole file
/// through a temporary sibling so a crash never leaves it half written.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, Value>>,
}

impl JsonFileStore {
    /// Opens the store at `path`. A missing file is an empty store; it is
    /// created on the first write.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the file exists but cannot be read, and
    /// `AppError::Json` if it is not a JSON object.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, AppError> {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => BTreeMap::new(),
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(err) if err.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(err.into()),
        };
        debug!(path = %path.display(), keys = values.len(), "storage file opened");
        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn values(&self) -> MutexGuard<'_, BTreeMap<String, Value>> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, values: &BTreeMap<String, Value>) -> Result<(), ShellError> {
        let encoded = serde_json::to_string_pretty(values)
            .map_err(|e| ShellError::Storage(format!("cannot encode storage file: {e}")))?;
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, encoded)
            .and_then(|()| fs::rename(&staging, &self.path))
            .map_err(|e| {
                ShellError::Storage(format!("cannot write {}: {e}", self.path.display()))
            })
    }

    fn mutate(&self, f: impl FnOnce(&mut BTreeMap<String, Value>)) -> Result<(), ShellError> {
        let mut values = self.values();
        let mut next = values.clone();
        f(&mut next);
        self.persist(&next)?;
        *values = next;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn save(&self, key: &str, value: &Value) -> Result<(), ShellError> {
        self.mutate(|values| {
            values.insert(key.to_owned(), value.clone());
        })
    }

    fn load(&self, key: &str) -> Result<Option<Value>, ShellError> {
        Ok(self.values().get(key).cloned())
    }

    fn remove(&self, key: &str) -> Result<(), ShellError> {
        if !self.has(key) {
            return Ok(());
        }
        self.mutate(|values| {
            values.remove(key);
        })
    }

    fn has(&self, key: &str) -> bool {
        self.values().contains_key(key)
    }

    fn clear(&self) -> Result<(), ShellError> {
        self.mutate(BTreeMap::clear)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scratch_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("termshell-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    #[test]
    fn test_missing_file_opens_empty() {
        let store = JsonFileStore::open(scratch_path("absent.json")).unwrap();

        assert!(!store.has("anything"));
        assert_eq!(store.load("anything").unwrap(), None);
    }

    #[test]
    fn test_values_survive_reopening() {
        // Arrange
        let path = scratch_path("store.json");
        let store = JsonFileStore::open(&path).unwrap();

        // Act
        store.save("chat.lorebookId", &json!("abc")).unwrap();
        store.save("volume", &json!(7)).unwrap();
        store.remove("volume").unwrap();
        let reopened = JsonFileStore::open(&path).unwrap();

        // Assert
        assert_eq!(reopened.load("chat.lorebookId").unwrap(), Some(json!("abc")));
        assert!(!reopened.has("volume"));
    }

    #[test]
    fn test_clear_empties_file() {
        let path = scratch_path("store.json");
        let store = JsonFileStore::open(&path).unwrap();
        store.save("a", &json!(1)).unwrap();

        store.clear().unwrap();

        assert!(!JsonFileStore::open(&path).unwrap().has("a"));
    }

    #[test]
    fn test_corrupt_file_is_rejected() {
        let path = scratch_path("store.json");
        fs::write(&path, "not json").unwrap();

        let result = JsonFileStore::open(&path);

        assert!(matches!(result, Err(AppError::Json(_))));
    }

    #[test]
    fn test_failed_write_keeps_cache_unchanged() {
        // Arrange
        let path = scratch_path("missing-dir").join("store.json");
        let store = JsonFileStore::open(&path).unwrap();

        // Act
        let result = store.save("a", &json!(1));

        // Assert
        assert!(matches!(result, Err(ShellError::Storage(_))));
        assert!(!store.has("a"));
    }
}
