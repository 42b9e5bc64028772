//! Event names, payloads and listener keys.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::ShellError;

/// Payload carried by every bus event.
pub type Payload = serde_json::Value;

/// Well-known event names exchanged between subsystems.
pub mod names {
    /// A line typed at the terminal prompt. Payload: `{command}`.
    pub const TERMINAL_COMMAND: &str = "terminalCommand";
    /// Power flag flipped. Payload: bare `bool`.
    pub const SYSTEM_POWER_CHANGE: &str = "systemPowerChange";
    /// Power state transition. Payload: `{state, isOn, testMode?}`.
    pub const SYSTEM_STATE_CHANGE: &str = "systemStateChange";
    /// The lorebook backend is ready to serve requests.
    pub const LOREBOOK_SYSTEM_INITIALIZED: &str = "lorebookSystemInitialized";
    /// The chat model loaded its lorebook. Payload: `{lorebookId, entries}`.
    pub const CHAT_MODEL_INITIALIZED: &str = "chatModelInitialized";
    /// An NPC started or stopped generating a reply. Payload: `{npcId?, active}`.
    pub const NPC_GENERATING: &str = "npcGenerating";
    /// Fired once per delivered chat message. Payload: `{npcId}`.
    pub const DISK_ACTIVITY: &str = "diskActivity";
    /// Fired once per delivered chat message. Payload: `{npcId}`.
    pub const NETWORK_ACTIVITY: &str = "networkActivity";
}

/// A parsed `name[.namespace]` listener key.
///
/// Only the first `.` separates the namespace, so `a.b.c` is event `a` in
/// namespace `b.c`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventKey<'a> {
    /// Base event name. Empty when the key was `.namespace`.
    pub name: &'a str,
    /// Optional namespace used for bulk removal.
    pub namespace: Option<&'a str>,
}

impl<'a> EventKey<'a> {
    /// Splits a listener key into its event name and namespace.
    #[must_use]
    pub fn parse(key: &'a str) -> Self {
        match key.split_once('.') {
            Some((name, namespace)) if !namespace.is_empty() => Self {
                name,
                namespace: Some(namespace),
            },
            Some((name, _)) => Self {
                name,
                namespace: None,
            },
            None => Self {
                name: key,
                namespace: None,
            },
        }
    }
}

/// Decodes an event payload into a typed value.
///
/// # Errors
///
/// Returns `ShellError::InvalidPayload` if the payload does not match `T`.
pub fn decode<T: DeserializeOwned>(event: &str, payload: &Payload) -> Result<T, ShellError> {
    T::deserialize(payload).map_err(|e| ShellError::InvalidPayload {
        event: event.to_owned(),
        reason: e.to_string(),
    })
}

/// Encodes a typed value as an event payload.
///
/// # Errors
///
/// Returns `ShellError::InvalidPayload` if `value` cannot be represented as
/// JSON (e.g. a map with non-string keys).
pub fn encode<T: Serialize + ?Sized>(event: &str, value: &T) -> Result<Payload, ShellError> {
    serde_json::to_value(value).map_err(|e| ShellError::InvalidPayload {
        event: event.to_owned(),
        reason: e.to_string(),
    })
}
