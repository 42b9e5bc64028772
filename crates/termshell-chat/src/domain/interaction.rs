//! Chat interaction records.

use uuid::Uuid;

/// One reply waiting for (or being given) screen time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryEntry {
    /// Speaker.
    pub npc_id: String,
    /// Reply text.
    pub message: String,
}

impl DeliveryEntry {
    /// Creates an entry.
    #[must_use]
    pub fn new(npc_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            npc_id: npc_id.into(),
            message: message.into(),
        }
    }
}

/// What became of the last request sent to the reply producer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// The producer has not answered yet.
    Pending,
    /// The producer answered with this text.
    Delivered(String),
    /// The producer failed with this message.
    Failed(String),
}

/// The most recent exchange, kept so `rerun` has a target even after a
/// failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingInteraction {
    /// Correlates the record with the producer call that owns it.
    pub interaction_id: Uuid,
    /// Target NPC.
    pub npc_id: String,
    /// What the user said.
    pub last_user_message: String,
    /// What came back.
    pub last_reply: ReplyOutcome,
}

impl PendingInteraction {
    /// A freshly sent message with no reply yet.
    #[must_use]
    pub fn new(interaction_id: Uuid, npc_id: &str, message: &str) -> Self {
        Self {
            interaction_id,
            npc_id: npc_id.to_owned(),
            last_user_message: message.to_owned(),
            last_reply: ReplyOutcome::Pending,
        }
    }
}

/// Where the chat subsystem is in the `Idle → Generating → Delivering →
/// Idle` cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatPhase {
    /// Nothing in flight and nothing on screen.
    Idle,
    /// Waiting on the reply producer.
    Generating,
    /// Replies are being paced onto the screen.
    Delivering,
}
