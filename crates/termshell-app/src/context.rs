//! Wiring: every shell component registered in, and resolved from, a
//! [`ServiceLocator`].

use std::sync::Arc;

use termshell_chat::{ChatController, ChatModel, ChatView};
use termshell_core::clock::Clock;
use termshell_core::display::ChatDisplay;
use termshell_core::error::ShellError;
use termshell_core::event::names;
use termshell_core::event_bus::EventBus;
use termshell_core::lorebook::LorebookBackend;
use termshell_core::reply::ReplyProducer;
use termshell_core::service_locator::ServiceLocator;
use termshell_core::storage::KeyValueStore;
use termshell_system::SystemService;
use tracing::{info, warn};

use crate::boot;
use crate::config::ShellConfig;
use crate::error::AppError;
use crate::lorebook_store::StoredLorebook;

/// Names the shell's services are registered under.
pub mod services {
    /// [`EventBus`](termshell_core::event_bus::EventBus).
    pub const EVENT_BUS: &str = "eventBus";
    /// `Arc<dyn KeyValueStore>`.
    pub const STORAGE: &str = "storage";
    /// `Arc<dyn LorebookBackend>`.
    pub const LOREBOOK: &str = "lorebook";
    /// `Arc<dyn ReplyProducer>`.
    pub const REPLY_PRODUCER: &str = "replyProducer";
    /// `Arc<dyn ChatDisplay>`.
    pub const DISPLAY: &str = "display";
    /// `Arc<dyn Clock>`.
    pub const CLOCK: &str = "clock";
    /// `Arc<SystemService>`.
    pub const SYSTEM: &str = "systemService";
    /// `Arc<ChatModel>`.
    pub const CHAT_MODEL: &str = "chatModel";
    /// `Arc<ChatView>`.
    pub const CHAT_VIEW: &str = "chatView";
    /// `Arc<ChatController>`.
    pub const CHAT_CONTROLLER: &str = "chatController";
}

/// Collaborators the shell is handed from outside.
pub struct Collaborators {
    /// Key/value storage.
    pub store: Arc<dyn KeyValueStore>,
    /// Source of NPC replies.
    pub producer: Arc<dyn ReplyProducer>,
    /// Where chat output goes.
    pub display: Arc<dyn ChatDisplay>,
    /// Wall clock for message timestamps.
    pub clock: Arc<dyn Clock>,
}

/// The wired shell.
pub struct ShellContext {
    config: ShellConfig,
    locator: ServiceLocator,
    bus: EventBus,
    display: Arc<dyn ChatDisplay>,
    system: Arc<SystemService>,
    chat_view: Arc<ChatView>,
    chat_controller: Arc<ChatController>,
    chat_model: Option<Arc<ChatModel>>,
}

impl std::fmt::Debug for ShellContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShellContext")
            .field("config", &self.config)
            .field("locator", &self.locator)
            .field("system", &self.system)
            .field("chat_controller", &self.chat_controller)
            .finish_non_exhaustive()
    }
}

/// Registers every shell service on `locator`. Nothing is built until it is
/// first resolved.
pub fn register_services(locator: &ServiceLocator, config: &ShellConfig, collaborators: Collaborators) {
    let Collaborators {
        store,
        producer,
        display,
        clock,
    } = collaborators;

    locator.register_instance(services::EVENT_BUS, EventBus::new());
    locator.register_instance(services::STORAGE, store);
    locator.register_instance(services::REPLY_PRODUCER, producer);
    locator.register_instance(services::DISPLAY, display);
    locator.register_instance(services::CLOCK, clock);

    locator.register_factory(services::LOREBOOK, |locator| {
        let store: Arc<dyn KeyValueStore> = locator.try_get(services::STORAGE)?;
        Ok(Arc::new(StoredLorebook::new(store)) as Arc<dyn LorebookBackend>)
    });

    locator.register_factory(services::SYSTEM, |locator| {
        let system = SystemService::new(locator.try_get(services::EVENT_BUS)?);
        system.attach();
        Ok(system)
    });

    let lorebook_name = config.chat_lorebook.clone();
    locator.register_factory(services::CHAT_MODEL, move |locator| {
        let model = Arc::new(ChatModel::new(
            locator.try_get(services::EVENT_BUS)?,
            locator.try_get(services::LOREBOOK)?,
            locator.try_get(services::STORAGE)?,
            lorebook_name.clone(),
        ));
        model.attach();
        Ok(model)
    });

    let display_delay = config.display_delay;
    locator.register_factory(services::CHAT_VIEW, move |locator| {
        Ok(ChatView::new(
            locator.try_get(services::EVENT_BUS)?,
            locator.try_get(services::DISPLAY)?,
            locator.try_get(services::CLOCK)?,
            display_delay,
        ))
    });

    locator.register_factory(services::CHAT_CONTROLLER, |locator| {
        let controller = ChatController::new(
            locator.try_get(services::EVENT_BUS)?,
            locator.try_get(services::REPLY_PRODUCER)?,
            locator.try_get(services::CHAT_VIEW)?,
            locator.try_get(services::SYSTEM)?,
            // The chat works without memory.
            locator.get(services::CHAT_MODEL),
        );
        controller.attach();
        Ok(controller)
    });
}

impl ShellContext {
    /// Registers and resolves every component.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Shell` if a required service cannot be resolved.
    pub fn build(config: ShellConfig, collaborators: Collaborators) -> Result<Self, AppError> {
        let locator = ServiceLocator::new();
        register_services(&locator, &config, collaborators);

        let bus: EventBus = locator.try_get(services::EVENT_BUS)?;
        let display: Arc<dyn ChatDisplay> = locator.try_get(services::DISPLAY)?;
        let system: Arc<SystemService> = locator.try_get(services::SYSTEM)?;
        let chat_controller: Arc<ChatController> = locator.try_get(services::CHAT_CONTROLLER)?;
        let chat_view: Arc<ChatView> = locator.try_get(services::CHAT_VIEW)?;
        let chat_model: Option<Arc<ChatModel>> = locator.get(services::CHAT_MODEL);
        info!(services = ?locator.names(), "shell wired");

        Ok(Self {
            config,
            locator,
            bus,
            display,
            system,
            chat_view,
            chat_controller,
            chat_model,
        })
    }

    /// Powers on and announces the lorebook backend.
    ///
    /// # Errors
    ///
    /// Returns `ShellError::InvalidPayload` if a power event cannot be
    /// encoded.
    pub async fn boot(&self) -> Result<(), ShellError> {
        boot::power_on(&self.bus, self.config.boot_delay, self.config.test_mode).await?;
        self.bus
            .emit(names::LOREBOOK_SYSTEM_INITIALIZED, &serde_json::Value::Null);
        Ok(())
    }

    /// Powers off, then waits for in-flight chat commands and queued chat
    /// output to finish.
    ///
    /// # Errors
    ///
    /// Returns `ShellError::InvalidPayload` if a power event cannot be
    /// encoded.
    pub async fn shutdown(&self) -> Result<(), ShellError> {
        boot::power_off(&self.bus, self.config.boot_delay).await?;
        let in_flight = self.chat_controller.in_flight();
        if in_flight > 0 {
            warn!(in_flight, "waiting for pending replies before exit");
        }
        self.chat_controller.wait_settled().await;
        self.chat_view.wait_idle().await;
        Ok(())
    }

    /// The shell's configuration.
    #[must_use]
    pub fn config(&self) -> &ShellConfig {
        &self.config
    }

    /// The service registry everything was resolved from.
    #[must_use]
    pub fn locator(&self) -> &ServiceLocator {
        &self.locator
    }

    /// The event bus.
    #[must_use]
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// The display sink.
    #[must_use]
    pub fn display(&self) -> &Arc<dyn ChatDisplay> {
        &self.display
    }

    /// The power state mirror.
    #[must_use]
    pub fn system(&self) -> &Arc<SystemService> {
        &self.system
    }

    /// The chat view.
    #[must_use]
    pub fn chat_view(&self) -> &Arc<ChatView> {
        &self.chat_view
    }

    /// The chat controller.
    #[must_use]
    pub fn chat_controller(&self) -> &Arc<ChatController> {
        &self.chat_controller
    }

    /// The chat model, if it could be built.
    #[must_use]
    pub fn chat_model(&self) -> Option<&Arc<ChatModel>> {
        self.chat_model.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use termshell_test_support::{FixedClock, MemoryStore, RecordingDisplay, ScriptedReplyProducer};

    fn collaborators() -> Collaborators {
        Collaborators {
            store: Arc::new(MemoryStore::new()),
            producer: Arc::new(ScriptedReplyProducer::new()),
            display: Arc::new(RecordingDisplay::new()),
            clock: Arc::new(FixedClock::reference()),
        }
    }

    #[test]
    fn test_registration_is_lazy() {
        // Arrange
        let locator = ServiceLocator::new();

        // Act
        register_services(&locator, &ShellConfig::default(), collaborators());

        // Assert
        assert!(locator.has(services::CHAT_CONTROLLER));
        let bus: EventBus = locator.get(services::EVENT_BUS).unwrap();
        assert_eq!(bus.listener_count(None), 0);
    }

    #[test]
    fn test_build_attaches_every_component() {
        // Arrange & Act
        let context = ShellContext::build(ShellConfig::default(), collaborators()).unwrap();

        // Assert
        let bus = context.bus();
        assert_eq!(bus.listener_count(Some(names::TERMINAL_COMMAND)), 1);
        assert_eq!(bus.listener_count(Some(names::SYSTEM_STATE_CHANGE)), 2);
        assert_eq!(bus.listener_count(Some(names::LOREBOOK_SYSTEM_INITIALIZED)), 1);
        assert!(context.chat_model().is_some());
        assert_eq!(context.locator().names().len(), 10);
    }

    #[test]
    fn test_resolved_services_are_shared() {
        let context = ShellContext::build(ShellConfig::default(), collaborators()).unwrap();

        let view: Arc<ChatView> = context.locator().get(services::CHAT_VIEW).unwrap();

        assert!(Arc::ptr_eq(&view, context.chat_view()));
    }
}
