//! Test reply producers — mock `ReplyProducer` implementations for tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use termshell_core::error::ShellError;
use termshell_core::reply::ReplyProducer;

/// One call received by a test producer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProducerCall {
    /// `process_message(npc_id, message)`.
    Message {
        /// Target NPC.
        npc_id: String,
        /// User message.
        message: String,
    },
    /// `rerun()`.
    Rerun,
}

/// A producer with one fixed reply per known NPC and optional per-NPC
/// latency. Unknown NPCs fail with `ShellError::UnknownTarget`.
#[derive(Debug, Default)]
pub struct ScriptedReplyProducer {
    replies: HashMap<String, String>,
    latency: HashMap<String, Duration>,
    rerun_reply: Option<String>,
    last_npc: Mutex<Option<String>>,
    calls: Mutex<Vec<ProducerCall>>,
}

impl ScriptedReplyProducer {
    /// Creates a producer that knows no NPCs.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an NPC that always answers `reply`.
    #[must_use]
    pub fn reply(mut self, npc_id: &str, reply: &str) -> Self {
        self.replies.insert(npc_id.to_owned(), reply.to_owned());
        self
    }

    /// Makes `npc_id` answer only after `delay` (tokio time).
    #[must_use]
    pub fn latency(mut self, npc_id: &str, delay: Duration) -> Self {
        self.latency.insert(npc_id.to_owned(), delay);
        self
    }

    /// Text returned by `rerun`. Without it, `rerun` repeats the last NPC's
    /// reply, or answers `"nothing to rerun"` if no message was sent yet.
    #[must_use]
    pub fn rerun_reply(mut self, reply: &str) -> Self {
        self.rerun_reply = Some(reply.to_owned());
        self
    }

    /// Every call received so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn calls(&self) -> Vec<ProducerCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReplyProducer for ScriptedReplyProducer {
    async fn process_message(&self, npc_id: &str, message: &str) -> Result<String, ShellError> {
        self.calls.lock().unwrap().push(ProducerCall::Message {
            npc_id: npc_id.to_owned(),
            message: message.to_owned(),
        });
        *self.last_npc.lock().unwrap() = Some(npc_id.to_owned());
        if let Some(delay) = self.latency.get(npc_id) {
            tokio::time::sleep(*delay).await;
        }
        self.replies
            .get(npc_id)
            .cloned()
            .ok_or_else(|| ShellError::UnknownTarget(format!("no NPC with id `{npc_id}`")))
    }

    async fn rerun(&self) -> Result<String, ShellError> {
        self.calls.lock().unwrap().push(ProducerCall::Rerun);
        if let Some(reply) = &self.rerun_reply {
            return Ok(reply.clone());
        }
        let last = self.last_npc.lock().unwrap().clone();
        match last {
            Some(npc_id) => self
                .replies
                .get(&npc_id)
                .cloned()
                .ok_or_else(|| ShellError::UnknownTarget(format!("no NPC with id `{npc_id}`"))),
            None => Ok("nothing to rerun".to_owned()),
        }
    }
}

/// A producer whose every call fails with a transport error.
#[derive(Debug, Default)]
pub struct FailingReplyProducer;

#[async_trait]
impl ReplyProducer for FailingReplyProducer {
    async fn process_message(&self, _npc_id: &str, _message: &str) -> Result<String, ShellError> {
        Err(ShellError::Transport("connection refused".into()))
    }

    async fn rerun(&self) -> Result<String, ShellError> {
        Err(ShellError::Transport("connection refused".into()))
    }
}
