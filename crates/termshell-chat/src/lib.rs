//! Termshell — NPC chat.
//!
//! Accepts `message`/`rerun` intents from the terminal, asks the injected
//! reply producer for an answer, and delivers answers to the display one at
//! a time through a paced FIFO queue. Conversation memory is kept in a chat
//! lorebook once the lorebook backend announces itself.

pub mod application;
pub mod domain;

pub use application::controller::ChatController;
pub use application::model::ChatModel;
pub use application::view::ChatView;
pub use domain::interaction::{ChatPhase, DeliveryEntry, PendingInteraction, ReplyOutcome};
