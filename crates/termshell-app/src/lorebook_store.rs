//! Lorebook backend persisted in the key/value store.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use termshell_core::error::ShellError;
use termshell_core::lorebook::{LorebookBackend, LorebookEntry};
use termshell_core::storage::{KeyValueStore, load_as, save_as};
use tracing::info;
use uuid::Uuid;

const INDEX_KEY: &str = "lorebook.index";
const DEFAULT_CHAT_LOREBOOK: &str = "chat";

fn entries_key(id: &str) -> String {
    format!("lorebook.{id}")
}

/// Keeps lorebooks as JSON values next to the rest of the shell's storage.
///
/// `lorebook.index` maps lorebook names to ids; each lorebook's entries live
/// under `lorebook.<id>`.
pub struct StoredLorebook {
    store: Arc<dyn KeyValueStore>,
    // Serializes read-modify-write cycles on the store.
    write_lock: Mutex<()>,
}

impl std::fmt::Debug for StoredLorebook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredLorebook").finish_non_exhaustive()
    }
}

impl StoredLorebook {
    /// Creates a backend over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    fn index(&self) -> Result<BTreeMap<String, String>, ShellError> {
        Ok(load_as(self.store.as_ref(), INDEX_KEY)?.unwrap_or_default())
    }

    fn ensure_known(&self, id: &str) -> Result<(), ShellError> {
        if self.index()?.values().any(|known| known == id) {
            Ok(())
        } else {
            Err(ShellError::UnknownTarget(format!("no lorebook `{id}`")))
        }
    }

    fn read(&self, id: &str) -> Result<Vec<LorebookEntry>, ShellError> {
        self.ensure_known(id)?;
        Ok(load_as(self.store.as_ref(), &entries_key(id))?.unwrap_or_default())
    }
}

#[async_trait]
impl LorebookBackend for StoredLorebook {
    async fn get_or_create_chat_lorebook(&self, name: Option<&str>) -> Result<String, ShellError> {
        let name = name.unwrap_or(DEFAULT_CHAT_LOREBOOK);
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut index = self.index()?;
        if let Some(id) = index.get(name) {
            return Ok(id.clone());
        }
        let id = Uuid::new_v4().to_string();
        save_as(self.store.as_ref(), &entries_key(&id), &Vec::<LorebookEntry>::new())?;
        index.insert(name.to_owned(), id.clone());
        save_as(self.store.as_ref(), INDEX_KEY, &index)?;
        info!(lorebook = name, lorebook_id = %id, "chat lorebook created");
        Ok(id)
    }

    async fn get_lorebook_entries(&self, id: &str) -> Result<Vec<LorebookEntry>, ShellError> {
        self.read(id)
    }

    async fn set_lorebook_entries(
        &self,
        id: &str,
        entries: Vec<LorebookEntry>,
    ) -> Result<(), ShellError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.ensure_known(id)?;
        save_as(self.store.as_ref(), &entries_key(id), &entries)
    }

    async fn create_lorebook_entries(
        &self,
        id: &str,
        entries: Vec<LorebookEntry>,
    ) -> Result<(), ShellError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut current = self.read(id)?;
        current.extend(entries);
        save_as(self.store.as_ref(), &entries_key(id), &current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use termshell_test_support::MemoryStore;

    fn entry(content: &str) -> LorebookEntry {
        LorebookEntry {
            keys: vec!["lab1".into()],
            content: content.into(),
            comment: String::new(),
        }
    }

    #[tokio::test]
    async fn test_get_or_create_is_stable_per_name() {
        // Arrange
        let lorebook = StoredLorebook::new(Arc::new(MemoryStore::new()));

        // Act
        let first = lorebook.get_or_create_chat_lorebook(None).await.unwrap();
        let again = lorebook.get_or_create_chat_lorebook(Some("chat")).await.unwrap();
        let other = lorebook.get_or_create_chat_lorebook(Some("campaign")).await.unwrap();

        // Assert
        assert_eq!(first, again);
        assert_ne!(first, other);
    }

    #[tokio::test]
    async fn test_entries_are_appended_then_replaced() {
        // Arrange
        let store = Arc::new(MemoryStore::new());
        let lorebook = StoredLorebook::new(Arc::clone(&store) as Arc<dyn KeyValueStore>);
        let id = lorebook.get_or_create_chat_lorebook(None).await.unwrap();

        // Act
        lorebook
            .create_lorebook_entries(&id, vec![entry("a"), entry("b")])
            .await
            .unwrap();
        lorebook.create_lorebook_entries(&id, vec![entry("c")]).await.unwrap();
        let appended = lorebook.get_lorebook_entries(&id).await.unwrap();
        lorebook.set_lorebook_entries(&id, vec![entry("z")]).await.unwrap();
        let replaced = lorebook.get_lorebook_entries(&id).await.unwrap();

        // Assert
        assert_eq!(appended, vec![entry("a"), entry("b"), entry("c")]);
        assert_eq!(replaced, vec![entry("z")]);
        assert!(store.keys().contains(&format!("lorebook.{id}")));
    }

    #[tokio::test]
    async fn test_unknown_lorebook_is_an_unknown_target() {
        let lorebook = StoredLorebook::new(Arc::new(MemoryStore::new()));

        let result = lorebook.get_lorebook_entries("nope").await;

        assert!(matches!(result, Err(ShellError::UnknownTarget(_))));
    }
}
