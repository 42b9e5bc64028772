//! Chat model: conversation memory kept in a chat lorebook.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use termshell_core::error::ShellError;
use termshell_core::event::names;
use termshell_core::event_bus::EventBus;
use termshell_core::lorebook::{LorebookBackend, LorebookEntry};
use termshell_core::storage::{KeyValueStore, load_as, save_as};
use tokio::runtime::Handle;
use tracing::{debug, info, instrument, warn};

use crate::domain::events::ChatModelInitialized;

/// Storage key holding the id of the chat lorebook in use.
pub const LOREBOOK_ID_KEY: &str = "chat.lorebookId";

/// Exchanges kept before the oldest are dropped.
pub const MAX_HISTORY_ENTRIES: usize = 200;

const NAMESPACE: &str = "chatModel";

#[derive(Debug, Default)]
struct ModelState {
    lorebook_id: Option<String>,
    history_len: usize,
}

/// Chat history backed by a [`LorebookBackend`].
///
/// The model stays dormant until the lorebook subsystem announces itself with
/// `lorebookSystemInitialized`; before that, [`record_exchange`](Self::record_exchange)
/// fails and callers carry on without memory.
pub struct ChatModel {
    bus: EventBus,
    lorebook: Arc<dyn LorebookBackend>,
    store: Arc<dyn KeyValueStore>,
    lorebook_name: Option<String>,
    history_limit: usize,
    state: Mutex<ModelState>,
}

impl std::fmt::Debug for ChatModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatModel")
            .field("lorebook_name", &self.lorebook_name)
            .field("history_limit", &self.history_limit)
            .field("state", &*self.state())
            .finish_non_exhaustive()
    }
}

impl ChatModel {
    /// Creates a model that has not loaded any lorebook yet.
    #[must_use]
    pub fn new(
        bus: EventBus,
        lorebook: Arc<dyn LorebookBackend>,
        store: Arc<dyn KeyValueStore>,
        lorebook_name: Option<String>,
    ) -> Self {
        Self {
            bus,
            lorebook,
            store,
            lorebook_name,
            history_limit: MAX_HISTORY_ENTRIES,
            state: Mutex::new(ModelState::default()),
        }
    }

    /// Overrides [`MAX_HISTORY_ENTRIES`].
    #[must_use]
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit.max(1);
        self
    }

    fn state(&self) -> MutexGuard<'_, ModelState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Initializes the model the first time `lorebookSystemInitialized` is
    /// emitted from within a runtime. Later emissions are ignored.
    ///
    /// The handler only unsubscribes once initialization has been spawned,
    /// so an announcement that arrives without a runtime can be repeated.
    pub fn attach(self: &Arc<Self>) {
        let model: Weak<Self> = Arc::downgrade(self);
        let key = format!("{}.{NAMESPACE}", names::LOREBOOK_SYSTEM_INITIALIZED);
        let subscription = key.clone();
        let started = AtomicBool::new(false);
        self.bus.on(&key, move |_| {
            let Some(model) = model.upgrade() else {
                return Ok(());
            };
            let handle = Handle::try_current().map_err(|e| {
                ShellError::Configuration(format!("no async runtime for chat model: {e}"))
            })?;
            if started.swap(true, Ordering::AcqRel) {
                return Ok(());
            }
            model.bus.off(&subscription, None);
            handle.spawn(async move {
                if let Err(err) = model.initialize().await {
                    warn!(error = %err, "chat model initialization failed");
                }
            });
            Ok(())
        });
    }

    /// Loads (or creates) the chat lorebook and announces it with
    /// `chatModelInitialized`. Returns the number of history entries found.
    ///
    /// A lorebook id remembered in storage is tried first; if the backend no
    /// longer knows it, a lorebook is looked up or created by name.
    ///
    /// # Errors
    ///
    /// Returns the backend's error if the lorebook cannot be resolved or
    /// read, and `ShellError::Storage` if the id cannot be persisted.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> Result<usize, ShellError> {
        let remembered: Option<String> = load_as(self.store.as_ref(), LOREBOOK_ID_KEY)?;
        let (lorebook_id, entries) = match remembered {
            Some(id) => match self.lorebook.get_lorebook_entries(&id).await {
                Ok(entries) => (id, entries),
                Err(ShellError::UnknownTarget(reason)) => {
                    debug!(lorebook_id = %id, %reason, "remembered chat lorebook is gone");
                    self.resolve_by_name().await?
                }
                Err(err) => return Err(err),
            },
            None => self.resolve_by_name().await?,
        };
        save_as(self.store.as_ref(), LOREBOOK_ID_KEY, &lorebook_id)?;

        let loaded = entries.len();
        {
            let mut state = self.state();
            state.lorebook_id = Some(lorebook_id.clone());
            state.history_len = loaded;
        }
        info!(lorebook_id = %lorebook_id, entries = loaded, "chat model initialized");
        self.bus.publish(
            names::CHAT_MODEL_INITIALIZED,
            &ChatModelInitialized {
                lorebook_id,
                entry_count: loaded,
            },
        )?;
        Ok(loaded)
    }

    async fn resolve_by_name(&self) -> Result<(String, Vec<LorebookEntry>), ShellError> {
        let id = self
            .lorebook
            .get_or_create_chat_lorebook(self.lorebook_name.as_deref())
            .await?;
        let entries = self.lorebook.get_lorebook_entries(&id).await?;
        Ok((id, entries))
    }

    /// Appends one user/NPC exchange to the chat lorebook, dropping the oldest
    /// exchanges once the history limit is exceeded.
    ///
    /// # Errors
    ///
    /// `ShellError::Configuration` before [`initialize`](Self::initialize)
    /// succeeded; otherwise whatever the backend returns.
    #[instrument(skip(self, user_message, reply))]
    pub async fn record_exchange(
        &self,
        npc_id: &str,
        user_message: &str,
        reply: &str,
    ) -> Result<(), ShellError> {
        let lorebook_id = self
            .lorebook_id()
            .ok_or_else(|| ShellError::Configuration("chat model is not initialized".into()))?;
        let entry = LorebookEntry {
            keys: vec![npc_id.to_owned()],
            content: format!("user: {user_message}\n{npc_id}: {reply}"),
            comment: format!("chat with {npc_id}"),
        };
        self.lorebook
            .create_lorebook_entries(&lorebook_id, vec![entry])
            .await?;

        let over_limit = {
            let mut state = self.state();
            state.history_len += 1;
            state.history_len > self.history_limit
        };
        if over_limit {
            self.trim(&lorebook_id).await?;
        }
        Ok(())
    }

    async fn trim(&self, lorebook_id: &str) -> Result<(), ShellError> {
        let mut entries = self.lorebook.get_lorebook_entries(lorebook_id).await?;
        let excess = entries.len().saturating_sub(self.history_limit);
        entries.drain(..excess);
        let kept = entries.len();
        self.lorebook
            .set_lorebook_entries(lorebook_id, entries)
            .await?;
        self.state().history_len = kept;
        debug!(lorebook_id, dropped = excess, kept, "chat history trimmed");
        Ok(())
    }

    /// Whether a lorebook has been loaded.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state().lorebook_id.is_some()
    }

    /// Id of the loaded lorebook.
    #[must_use]
    pub fn lorebook_id(&self) -> Option<String> {
        self.state().lorebook_id.clone()
    }

    /// Exchanges currently held in the lorebook, as far as the model knows.
    #[must_use]
    pub fn history_len(&self) -> usize {
        self.state().history_len
    }
}
