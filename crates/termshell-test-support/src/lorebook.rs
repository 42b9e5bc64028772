//! Test lorebooks — mock `LorebookBackend` implementations for tests.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use termshell_core::error::ShellError;
use termshell_core::lorebook::{LorebookBackend, LorebookEntry};

const DEFAULT_NAME: &str = "chat";

/// An in-memory lorebook backend that counts rewrite calls.
///
/// Lorebook ids are `lorebook-<n>` in creation order.
#[derive(Debug, Default)]
pub struct RecordingLorebook {
    ids_by_name: Mutex<BTreeMap<String, String>>,
    entries: Mutex<BTreeMap<String, Vec<LorebookEntry>>>,
    set_calls: Mutex<usize>,
}

impl RecordingLorebook {
    /// Creates a backend with no lorebooks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populates the lorebook called `name` with `entries`.
    ///
    /// # Panics
    ///
    /// Panics if an internal mutex is poisoned.
    #[must_use]
    pub fn with_entries(self, name: &str, entries: Vec<LorebookEntry>) -> Self {
        let id = self.id_for(name);
        self.entries.lock().unwrap().insert(id, entries);
        self
    }

    fn id_for(&self, name: &str) -> String {
        let mut ids = self.ids_by_name.lock().unwrap();
        let next = format!("lorebook-{}", ids.len() + 1);
        ids.entry(name.to_owned()).or_insert(next).clone()
    }

    /// Current entries of lorebook `id`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn entries_of(&self, id: &str) -> Vec<LorebookEntry> {
        self.entries
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of `set_lorebook_entries` calls.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn set_calls(&self) -> usize {
        *self.set_calls.lock().unwrap()
    }

    fn known(&self, id: &str) -> Result<(), ShellError> {
        if self.ids_by_name.lock().unwrap().values().any(|known| known == id) {
            Ok(())
        } else {
            Err(ShellError::UnknownTarget(format!("no lorebook `{id}`")))
        }
    }
}

#[async_trait]
impl LorebookBackend for RecordingLorebook {
    async fn get_or_create_chat_lorebook(&self, name: Option<&str>) -> Result<String, ShellError> {
        Ok(self.id_for(name.unwrap_or(DEFAULT_NAME)))
    }

    async fn get_lorebook_entries(&self, id: &str) -> Result<Vec<LorebookEntry>, ShellError> {
        self.known(id)?;
        Ok(self.entries_of(id))
    }

    async fn set_lorebook_entries(
        &self,
        id: &str,
        entries: Vec<LorebookEntry>,
    ) -> Result<(), ShellError> {
        self.known(id)?;
        *self.set_calls.lock().unwrap() += 1;
        self.entries.lock().unwrap().insert(id.to_owned(), entries);
        Ok(())
    }

    async fn create_lorebook_entries(
        &self,
        id: &str,
        entries: Vec<LorebookEntry>,
    ) -> Result<(), ShellError> {
        self.known(id)?;
        self.entries
            .lock()
            .unwrap()
            .entry(id.to_owned())
            .or_default()
            .extend(entries);
        Ok(())
    }
}

/// A lorebook backend that always returns a transport error.
#[derive(Debug, Default)]
pub struct FailingLorebook;

#[async_trait]
impl LorebookBackend for FailingLorebook {
    async fn get_or_create_chat_lorebook(&self, _name: Option<&str>) -> Result<String, ShellError> {
        Err(ShellError::Transport("lorebook backend offline".into()))
    }

    async fn get_lorebook_entries(&self, _id: &str) -> Result<Vec<LorebookEntry>, ShellError> {
        Err(ShellError::Transport("lorebook backend offline".into()))
    }

    async fn set_lorebook_entries(
        &self,
        _id: &str,
        _entries: Vec<LorebookEntry>,
    ) -> Result<(), ShellError> {
        Err(ShellError::Transport("lorebook backend offline".into()))
    }

    async fn create_lorebook_entries(
        &self,
        _id: &str,
        _entries: Vec<LorebookEntry>,
    ) -> Result<(), ShellError> {
        Err(ShellError::Transport("lorebook backend offline".into()))
    }
}
