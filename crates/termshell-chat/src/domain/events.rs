//! Event payloads published by the chat context.

use serde::{Deserialize, Serialize};

/// Payload of `diskActivity` and `networkActivity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    /// NPC whose message was just delivered.
    pub npc_id: String,
}

/// Payload of `npcGenerating`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Generating {
    /// NPC the pending reply belongs to, if any.
    pub npc_id: Option<String>,
    /// Whether generation started (`true`) or ended.
    pub active: bool,
}

/// Payload of `chatModelInitialized`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatModelInitialized {
    /// Id of the chat lorebook in use.
    pub lorebook_id: String,
    /// Number of history entries loaded.
    pub entry_count: usize,
}
