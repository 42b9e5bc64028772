//! Reply producer abstraction.

use async_trait::async_trait;

use crate::error::ShellError;

/// External service that produces NPC replies (typically an LLM backend).
#[async_trait]
pub trait ReplyProducer: Send + Sync {
    /// Produces the reply of `npc_id` to `message`.
    ///
    /// # Errors
    ///
    /// `ShellError::UnknownTarget` if the NPC does not exist,
    /// `ShellError::Transport` if the backend could not be reached.
    async fn process_message(&self, npc_id: &str, message: &str) -> Result<String, ShellError>;

    /// Regenerates the reply to the last interaction the producer saw.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`process_message`](Self::process_message).
    async fn rerun(&self) -> Result<String, ShellError>;
}
