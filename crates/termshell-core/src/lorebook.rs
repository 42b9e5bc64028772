//! Lorebook backend abstraction.
//!
//! Lorebooks are named collections of keyed text entries. The chat subsystem
//! keeps its conversation memory in one of them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ShellError;

/// One lorebook record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LorebookEntry {
    /// Keys that activate this entry (NPC ids, topics).
    pub keys: Vec<String>,
    /// Entry body.
    pub content: String,
    /// Free-form annotation.
    #[serde(default)]
    pub comment: String,
}

/// Persistence backend for lorebooks. Every call may fail and failures are
/// returned to the caller as-is.
#[async_trait]
pub trait LorebookBackend: Send + Sync {
    /// Returns the id of the chat lorebook called `name` (or the default chat
    /// lorebook when `name` is `None`), creating it if needed.
    async fn get_or_create_chat_lorebook(&self, name: Option<&str>) -> Result<String, ShellError>;

    /// Loads every entry of lorebook `id`, oldest first.
    async fn get_lorebook_entries(&self, id: &str) -> Result<Vec<LorebookEntry>, ShellError>;

    /// Replaces every entry of lorebook `id`.
    async fn set_lorebook_entries(&self, id: &str, entries: Vec<LorebookEntry>)
    -> Result<(), ShellError>;

    /// Appends entries to lorebook `id`.
    async fn create_lorebook_entries(
        &self,
        id: &str,
        entries: Vec<LorebookEntry>,
    ) -> Result<(), ShellError>;
}
