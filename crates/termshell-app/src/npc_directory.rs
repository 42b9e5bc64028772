//! Local reply producer backed by a YAML roster of NPCs with canned replies.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use termshell_core::error::ShellError;
use termshell_core::reply::ReplyProducer;
use tracing::debug;

use crate::error::AppError;

/// Reply given to `rerun` before anything was said.
pub const NOTHING_TO_RERUN: &str = "No previous message to rerun.";

const BUILTIN_ROSTER: &str = r#"
npcs:
  - id: lab1
    name: Lab Assistant
    delay_ms: 400
    replies:
      - "Good to see you again. You said: \"{message}\""
      - "The reactor logs are clean today. Anything else?"
      - "I'll note that in the lab journal."
  - id: guard
    name: Gate Guard
    delay_ms: 250
    replies:
      - "Halt. State your business."
      - "\"{message}\"? Move along."
  - id: oracle
    name: Oracle
    delay_ms: 900
    replies:
      - "The answer to \"{message}\" is written in the static."
      - "Ask again when the lights flicker twice."
"#;

#[derive(Debug, Deserialize)]
struct Roster {
    npcs: Vec<NpcProfile>,
}

/// One NPC in the roster.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NpcProfile {
    /// Id used in `message <id> ...`.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Simulated generation time.
    #[serde(default)]
    pub delay_ms: u64,
    /// Canned replies, used in rotation. `{message}` is replaced with the
    /// user's message.
    pub replies: Vec<String>,
}

#[derive(Debug, Default)]
struct Conversation {
    next_reply: HashMap<String, usize>,
    last: Option<(String, String)>,
}

/// Answers chat messages from a fixed roster.
#[derive(Debug)]
pub struct NpcDirectory {
    npcs: HashMap<String, NpcProfile>,
    conversation: Mutex<Conversation>,
}

impl NpcDirectory {
    /// Parses a YAML roster (`npcs: [{id, name?, delay_ms?, replies}]`).
    ///
    /// # Errors
    ///
    /// `AppError::Yaml` for malformed YAML, `AppError::Config` for an NPC
    /// without replies or a duplicated id.
    pub fn from_yaml(source: &str) -> Result<Self, AppError> {
        let roster: Roster = serde_yaml::from_str(source)?;
        let mut npcs = HashMap::with_capacity(roster.npcs.len());
        for npc in roster.npcs {
            if npc.replies.is_empty() {
                return Err(AppError::Config(format!("npc `{}` has no replies", npc.id)));
            }
            let id = npc.id.clone();
            if npcs.insert(id.clone(), npc).is_some() {
                return Err(AppError::Config(format!("npc `{id}` is listed twice")));
            }
        }
        Ok(Self {
            npcs,
            conversation: Mutex::new(Conversation::default()),
        })
    }

    /// Loads a roster file.
    ///
    /// # Errors
    ///
    /// `AppError::Io` if the file cannot be read, otherwise as
    /// [`from_yaml`](Self::from_yaml).
    pub fn from_path(path: &Path) -> Result<Self, AppError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_yaml(&source)
    }

    /// The roster shipped with the binary.
    ///
    /// # Errors
    ///
    /// Only if the built-in roster itself is malformed.
    pub fn builtin() -> Result<Self, AppError> {
        Self::from_yaml(BUILTIN_ROSTER)
    }

    /// Known NPC ids, sorted.
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.npcs.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Profile of `npc_id`.
    #[must_use]
    pub fn profile(&self, npc_id: &str) -> Option<&NpcProfile> {
        self.npcs.get(npc_id)
    }

    fn conversation(&self) -> MutexGuard<'_, Conversation> {
        self.conversation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lookup(&self, npc_id: &str) -> Result<&NpcProfile, ShellError> {
        self.npcs
            .get(npc_id)
            .ok_or_else(|| ShellError::UnknownTarget(format!("no NPC with id `{npc_id}`")))
    }

    fn next_reply(&self, npc: &NpcProfile, message: &str) -> String {
        let index = {
            let mut conversation = self.conversation();
            let slot = conversation.next_reply.entry(npc.id.clone()).or_insert(0);
            let index = *slot % npc.replies.len();
            *slot = index + 1;
            index
        };
        npc.replies[index].replace("{message}", message)
    }

    async fn answer(&self, npc: &NpcProfile, message: &str) -> String {
        if npc.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(npc.delay_ms)).await;
        }
        self.next_reply(npc, message)
    }
}

#[async_trait]
impl ReplyProducer for NpcDirectory {
    async fn process_message(&self, npc_id: &str, message: &str) -> Result<String, ShellError> {
        let npc = self.lookup(npc_id)?;
        self.conversation().last = Some((npc_id.to_owned(), message.to_owned()));
        debug!(npc_id, "composing canned reply");
        Ok(self.answer(npc, message).await)
    }

    async fn rerun(&self) -> Result<String, ShellError> {
        let last = self.conversation().last.clone();
        let Some((npc_id, message)) = last else {
            return Ok(NOTHING_TO_RERUN.to_owned());
        };
        let npc = self.lookup(&npc_id)?;
        Ok(self.answer(npc, &message).await)
    }
}
