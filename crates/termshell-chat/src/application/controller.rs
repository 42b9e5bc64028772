//! Chat controller: turns chat intents into reply-producer calls and hands
//! the answers to the view.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use termshell_core::error::ShellError;
use termshell_core::event::{Payload, decode, names};
use termshell_core::event_bus::{EventBus, HandlerResult};
use termshell_core::reply::ReplyProducer;
use termshell_system::SystemService;
use termshell_system::domain::events::SystemStateChange;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tracing::{Span, debug, field, info, instrument, warn};
use uuid::Uuid;

use super::model::ChatModel;
use super::view::ChatView;
use crate::domain::commands::{ChatCommand, MESSAGE_USAGE, TerminalCommand};
use crate::domain::interaction::{ChatPhase, DeliveryEntry, PendingInteraction, ReplyOutcome};

const NAMESPACE: &str = "chat";

/// Shown when a chat command arrives while the shell is booting, shutting
/// down or off.
pub const NOT_OPERATIONAL: &str = "system is not operational; command ignored";

/// Coordinates the chat subsystem.
///
/// Producer failures never escape: every operation reports success as a
/// `bool` and puts any failure on the display.
pub struct ChatController {
    bus: EventBus,
    producer: Arc<dyn ReplyProducer>,
    view: Arc<ChatView>,
    system: Arc<SystemService>,
    model: Option<Arc<ChatModel>>,
    pending: Mutex<Option<PendingInteraction>>,
    generating: AtomicBool,
    in_flight: AtomicUsize,
    settled: Notify,
}

impl std::fmt::Debug for ChatController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatController")
            .field("pending", &*self.pending())
            .field("generating", &self.is_generating())
            .field("in_flight", &self.in_flight())
            .finish_non_exhaustive()
    }
}

impl ChatController {
    /// Creates a detached controller. Without a `model`, exchanges are not
    /// remembered.
    #[must_use]
    pub fn new(
        bus: EventBus,
        producer: Arc<dyn ReplyProducer>,
        view: Arc<ChatView>,
        system: Arc<SystemService>,
        model: Option<Arc<ChatModel>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            bus,
            producer,
            view,
            system,
            model,
            pending: Mutex::new(None),
            generating: AtomicBool::new(false),
            in_flight: AtomicUsize::new(0),
            settled: Notify::new(),
        })
    }

    /// Subscribes to `terminalCommand` and `systemStateChange` under the
    /// `chat` namespace.
    pub fn attach(self: &Arc<Self>) {
        let controller = Arc::downgrade(self);
        self.bus.on(
            &format!("{}.{NAMESPACE}", names::TERMINAL_COMMAND),
            move |payload| with_controller(&controller, |c| c.handle_terminal_command(payload)),
        );
        let controller = Arc::downgrade(self);
        self.bus.on(
            &format!("{}.{NAMESPACE}", names::SYSTEM_STATE_CHANGE),
            move |payload| with_controller(&controller, |c| c.handle_state_change(payload)),
        );
        debug!("chat controller attached");
    }

    /// Removes this controller's bus handlers.
    pub fn detach(&self) {
        self.bus.off(&format!(".{NAMESPACE}"), None);
    }

    fn pending(&self) -> MutexGuard<'_, Option<PendingInteraction>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn handle_terminal_command(self: &Arc<Self>, payload: &Payload) -> HandlerResult {
        let TerminalCommand { command } = decode(names::TERMINAL_COMMAND, payload)?;
        let parsed = match ChatCommand::parse(&command) {
            Ok(Some(parsed)) => parsed,
            Ok(None) => return Ok(()),
            Err(err) => {
                debug!(%command, error = %err, "rejected chat command");
                self.view.show_error(&err.to_string());
                return Ok(());
            }
        };
        if !self.system.is_operational() {
            debug!(%command, state = %self.system.power_state(), "chat command while not operational");
            self.view.show_system(NOT_OPERATIONAL);
            return Ok(());
        }

        let handle = Handle::try_current().map_err(|e| {
            ShellError::Configuration(format!("no async runtime for chat commands: {e}"))
        })?;
        let guard = InFlight::enter(Arc::clone(self));
        handle.spawn(async move {
            let controller = &guard.0;
            match parsed {
                ChatCommand::Message { npc_id, text } => {
                    controller.send_message_to_npc(&npc_id, &text).await;
                }
                ChatCommand::Rerun => {
                    controller.rerun_last_message().await;
                }
            }
        });
        Ok(())
    }

    fn handle_state_change(&self, payload: &Payload) -> HandlerResult {
        let change: SystemStateChange = decode(names::SYSTEM_STATE_CHANGE, payload)?;
        if change.state.is_shutting_down() {
            self.reset_generating_state();
        }
        Ok(())
    }

    /// Sends `message` to `npc_id` and queues the reply for display.
    ///
    /// The interaction is recorded before the producer is awaited, so `rerun`
    /// has a target even when this call fails. A reply that arrives after the
    /// shell powered off is still delivered.
    #[instrument(skip(self, message), fields(correlation_id = field::Empty))]
    pub async fn send_message_to_npc(&self, npc_id: &str, message: &str) -> bool {
        if npc_id.trim().is_empty() || message.trim().is_empty() {
            let err = ShellError::Validation(MESSAGE_USAGE.to_owned());
            self.view.show_error(&err.to_string());
            return false;
        }
        let correlation_id = Uuid::new_v4();
        Span::current().record("correlation_id", field::display(correlation_id));

        self.start_generating(Some(npc_id));
        *self.pending() = Some(PendingInteraction::new(correlation_id, npc_id, message));
        info!(npc_id, "sending message to npc");

        let result = self.producer.process_message(npc_id, message).await;
        self.finish_generating(Some(npc_id));

        match result {
            Ok(reply) => {
                self.record_outcome(correlation_id, ReplyOutcome::Delivered(reply.clone()));
                self.view
                    .queue_message(DeliveryEntry::new(npc_id, reply.as_str()));
                info!(npc_id, "npc reply queued");
                self.remember(npc_id, message, &reply).await;
                true
            }
            Err(err) => {
                warn!(npc_id, error = %err, "reply producer failed");
                self.record_outcome(correlation_id, ReplyOutcome::Failed(err.to_string()));
                self.view.show_error(&format!("{npc_id}: {err}"));
                false
            }
        }
    }

    /// Asks the producer to regenerate its last reply.
    ///
    /// With a recorded interaction the reply is queued for that NPC; without
    /// one it is shown as a system line.
    #[instrument(skip(self), fields(correlation_id = field::Empty))]
    pub async fn rerun_last_message(&self) -> bool {
        let target = self
            .pending()
            .as_ref()
            .map(|p| (p.interaction_id, p.npc_id.clone()));
        if let Some((correlation_id, _)) = &target {
            Span::current().record("correlation_id", field::display(correlation_id));
        }
        let npc_id = target.as_ref().map(|(_, npc_id)| npc_id.as_str());

        self.start_generating(npc_id);
        let result = self.producer.rerun().await;
        self.finish_generating(npc_id);

        match (result, target) {
            (Ok(reply), Some((correlation_id, npc_id))) => {
                self.record_outcome(correlation_id, ReplyOutcome::Delivered(reply.clone()));
                self.view.queue_message(DeliveryEntry::new(npc_id, reply));
                true
            }
            (Ok(reply), None) => {
                debug!("rerun without history; showing reply as system line");
                self.view.show_system(&reply);
                true
            }
            (Err(err), Some((correlation_id, npc_id))) => {
                warn!(npc_id, error = %err, "rerun failed");
                self.record_outcome(correlation_id, ReplyOutcome::Failed(err.to_string()));
                self.view.show_error(&format!("{npc_id}: {err}"));
                false
            }
            (Err(err), None) => {
                warn!(error = %err, "rerun failed");
                self.view.show_error(&format!("rerun: {err}"));
                false
            }
        }
    }

    /// Clears the generating flag without cancelling the in-flight producer
    /// call.
    pub fn reset_generating_state(&self) {
        self.generating.store(false, Ordering::Release);
        self.view.set_generating(None, false);
        info!("chat generating state reset");
    }

    fn start_generating(&self, npc_id: Option<&str>) {
        self.generating.store(true, Ordering::Release);
        self.view.set_generating(npc_id, true);
    }

    fn finish_generating(&self, npc_id: Option<&str>) {
        if self.generating.swap(false, Ordering::AcqRel) {
            self.view.set_generating(npc_id, false);
        }
    }

    // A newer send may have replaced the record while this one was awaiting.
    fn record_outcome(&self, interaction_id: Uuid, outcome: ReplyOutcome) {
        let mut pending = self.pending();
        if let Some(current) = pending
            .as_mut()
            .filter(|p| p.interaction_id == interaction_id)
        {
            current.last_reply = outcome;
        }
    }

    async fn remember(&self, npc_id: &str, message: &str, reply: &str) {
        let Some(model) = self.model.as_ref().filter(|m| m.is_ready()) else {
            return;
        };
        if let Err(err) = model.record_exchange(npc_id, message, reply).await {
            warn!(npc_id, error = %err, "chat exchange not recorded");
        }
    }

    /// Where the chat subsystem is in its `Idle → Generating → Delivering`
    /// cycle.
    #[must_use]
    pub fn phase(&self) -> ChatPhase {
        if self.is_generating() {
            ChatPhase::Generating
        } else if self.view.is_displaying() {
            ChatPhase::Delivering
        } else {
            ChatPhase::Idle
        }
    }

    /// Copy of the most recent interaction.
    #[must_use]
    pub fn pending_interaction(&self) -> Option<PendingInteraction> {
        self.pending().clone()
    }

    /// Whether a producer call is outstanding (and not reset).
    #[must_use]
    pub fn is_generating(&self) -> bool {
        self.generating.load(Ordering::Acquire)
    }

    /// Chat commands spawned from the bus whose producer call or delivery
    /// has not finished yet.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Resolves once every spawned chat command has finished, including
    /// commands whose reply resolves after power-off.
    pub async fn wait_settled(&self) {
        loop {
            let notified = self.settled.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Counts a spawned chat command for as long as it runs, even if it panics.
struct InFlight(Arc<ChatController>);

impl InFlight {
    fn enter(controller: Arc<ChatController>) -> Self {
        controller.in_flight.fetch_add(1, Ordering::AcqRel);
        Self(controller)
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if self.0.in_flight.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.0.settled.notify_waiters();
        }
    }
}

fn with_controller(
    controller: &Weak<ChatController>,
    f: impl FnOnce(&Arc<ChatController>) -> HandlerResult,
) -> HandlerResult {
    match controller.upgrade() {
        Some(controller) => f(&controller),
        None => Ok(()),
    }
}
