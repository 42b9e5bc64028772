//! Chat view: owns the delivery queue and paces replies onto the display.
//!
//! Replies can resolve in bursts, but the player reads them one at a time.
//! The view keeps a FIFO of pending entries and a single drain task that
//! shows the head entry, waits a fixed delay, and moves on. An `is_displaying`
//! flag, flipped under the same lock as the queue, guarantees that at most
//! one drain task exists: enqueuing while a drain is running only appends.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use termshell_core::clock::Clock;
use termshell_core::display::ChatDisplay;
use termshell_core::event::names;
use termshell_core::event_bus::EventBus;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::domain::events::{Activity, Generating};
use crate::domain::framing::frame_message;
use crate::domain::interaction::DeliveryEntry;

/// Pause between two delivered messages when none is configured.
pub const DEFAULT_DISPLAY_DELAY: Duration = Duration::from_millis(1500);

#[derive(Debug, Default)]
struct DeliveryState {
    queue: VecDeque<DeliveryEntry>,
    is_displaying: bool,
}

/// Presentation side of the chat subsystem.
pub struct ChatView {
    bus: EventBus,
    display: Arc<dyn ChatDisplay>,
    clock: Arc<dyn Clock>,
    display_delay: Duration,
    delivery: Mutex<DeliveryState>,
    idle: Notify,
}

impl std::fmt::Debug for ChatView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatView")
            .field("display_delay", &self.display_delay)
            .field("delivery", &*self.delivery())
            .finish_non_exhaustive()
    }
}

impl ChatView {
    /// Creates a view that renders to `display` and waits `display_delay`
    /// after each delivered message.
    #[must_use]
    pub fn new(
        bus: EventBus,
        display: Arc<dyn ChatDisplay>,
        clock: Arc<dyn Clock>,
        display_delay: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            bus,
            display,
            clock,
            display_delay,
            delivery: Mutex::new(DeliveryState::default()),
            idle: Notify::new(),
        })
    }

    fn delivery(&self) -> MutexGuard<'_, DeliveryState> {
        self.delivery.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends `entry` to the delivery queue and starts draining if no drain
    /// is running.
    ///
    /// Must be called from within a tokio runtime for the drain to start;
    /// otherwise the entry stays queued until the next call that can start
    /// one.
    pub fn queue_message(self: &Arc<Self>, entry: DeliveryEntry) {
        let start_drain = {
            let mut delivery = self.delivery();
            delivery.queue.push_back(entry);
            debug!(queued = delivery.queue.len(), "chat message queued");
            !std::mem::replace(&mut delivery.is_displaying, true)
        };
        if !start_drain {
            return;
        }
        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn(Arc::clone(self).process_message_queue());
            }
            Err(err) => {
                warn!(error = %err, "no async runtime; chat delivery postponed");
                self.delivery().is_displaying = false;
            }
        }
    }

    async fn process_message_queue(self: Arc<Self>) {
        loop {
            let next = {
                let mut delivery = self.delivery();
                let next = delivery.queue.pop_front();
                delivery.is_displaying = next.is_some();
                next
            };
            let Some(entry) = next else {
                debug!("chat delivery queue drained");
                self.idle.notify_waiters();
                return;
            };
            self.render(&entry);
            tokio::time::sleep(self.display_delay).await;
        }
    }

    fn render(&self, entry: &DeliveryEntry) {
        let lines = frame_message(entry, self.clock.now());
        self.display.print_lines(&lines);
        let activity = Activity {
            npc_id: entry.npc_id.clone(),
        };
        for event in [names::DISK_ACTIVITY, names::NETWORK_ACTIVITY] {
            if let Err(err) = self.bus.publish(event, &activity) {
                warn!(event, error = %err, "activity event not published");
            }
        }
    }

    /// Shows a line that does not belong to any NPC.
    pub fn show_system(&self, text: &str) {
        self.display.print_system(text);
    }

    /// Shows an error line.
    pub fn show_error(&self, text: &str) {
        self.display.print_error(text);
    }

    /// Toggles the generating indicator and announces it on the bus.
    pub fn set_generating(&self, npc_id: Option<&str>, active: bool) {
        self.display.set_indicator(npc_id, active);
        let payload = Generating {
            npc_id: npc_id.map(str::to_owned),
            active,
        };
        if let Err(err) = self.bus.publish(names::NPC_GENERATING, &payload) {
            warn!(error = %err, "generating indicator not published");
        }
    }

    /// Whether a drain is in progress (an entry is on screen or its display
    /// delay has not elapsed yet).
    #[must_use]
    pub fn is_displaying(&self) -> bool {
        self.delivery().is_displaying
    }

    /// Entries waiting behind the one on screen.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.delivery().queue.len()
    }

    /// Resolves once the delivery queue has fully drained.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if !self.is_displaying() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use termshell_test_support::{EventRecorder, FixedClock, RecordingDisplay};

    const DELAY: Duration = Duration::from_millis(1500);

    fn view_with(display: &Arc<RecordingDisplay>) -> (EventBus, Arc<ChatView>) {
        let bus = EventBus::new();
        let view = ChatView::new(
            bus.clone(),
            Arc::clone(display) as Arc<dyn ChatDisplay>,
            Arc::new(FixedClock::reference()),
            DELAY,
        );
        (bus, view)
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_are_displayed_in_order_separated_by_the_delay() {
        // Arrange
        let display = Arc::new(RecordingDisplay::new());
        let (_bus, view) = view_with(&display);

        // Act
        view.queue_message(DeliveryEntry::new("lab1", "one"));
        view.queue_message(DeliveryEntry::new("lab2", "two"));
        view.queue_message(DeliveryEntry::new("lab1", "three"));
        view.wait_idle().await;

        // Assert
        assert_eq!(display.message_bodies(), vec!["one", "two", "three"]);
        let instants: Vec<_> = display.messages().into_iter().map(|(_, at)| at).collect();
        assert_eq!(instants[1] - instants[0], DELAY);
        assert_eq!(instants[2] - instants[1], DELAY);
        assert!(!view.is_displaying());
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_entry_is_displayed_immediately() {
        // Arrange
        let display = Arc::new(RecordingDisplay::new());
        let (_bus, view) = view_with(&display);
        let start = tokio::time::Instant::now();

        // Act
        view.queue_message(DeliveryEntry::new("lab1", "hello"));
        view.wait_idle().await;

        // Assert
        let (_, at) = display.messages()[0].clone();
        assert_eq!(at, start);
        assert_eq!(tokio::time::Instant::now() - start, DELAY);
    }

    #[tokio::test(start_paused = true)]
    async fn test_enqueue_during_drain_does_not_start_a_second_drain() {
        // Arrange
        let display = Arc::new(RecordingDisplay::new());
        let (_bus, view) = view_with(&display);
        view.queue_message(DeliveryEntry::new("lab1", "first"));
        tokio::task::yield_now().await;
        assert!(view.is_displaying());

        // Act
        tokio::time::advance(Duration::from_millis(500)).await;
        view.queue_message(DeliveryEntry::new("lab1", "second"));
        let queued_behind = view.queued();
        view.wait_idle().await;

        // Assert
        assert_eq!(queued_behind, 1);
        let instants: Vec<_> = display.messages().into_iter().map(|(_, at)| at).collect();
        assert_eq!(instants.len(), 2);
        assert_eq!(instants[1] - instants[0], DELAY);
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_delivery_emits_disk_and_network_activity() {
        // Arrange
        let display = Arc::new(RecordingDisplay::new());
        let (bus, view) = view_with(&display);
        let recorder = EventRecorder::attach(&bus, &[names::DISK_ACTIVITY, names::NETWORK_ACTIVITY]);

        // Act
        view.queue_message(DeliveryEntry::new("lab1", "one"));
        view.queue_message(DeliveryEntry::new("lab2", "two"));
        view.wait_idle().await;

        // Assert
        let order: Vec<String> = recorder.events().into_iter().map(|(name, _)| name).collect();
        assert_eq!(
            order,
            vec![
                names::DISK_ACTIVITY,
                names::NETWORK_ACTIVITY,
                names::DISK_ACTIVITY,
                names::NETWORK_ACTIVITY,
            ]
        );
        assert_eq!(
            recorder.payloads(names::DISK_ACTIVITY)[1],
            serde_json::json!({ "npcId": "lab2" })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_rendered_header_uses_the_injected_clock() {
        let display = Arc::new(RecordingDisplay::new());
        let (_bus, view) = view_with(&display);

        view.queue_message(DeliveryEntry::new("lab1", "hello"));
        view.wait_idle().await;

        assert_eq!(display.messages()[0].0[0], ">> lab1 [10:00:00]");
    }

    #[tokio::test(start_paused = true)]
    async fn test_queue_restarts_after_draining() {
        // Arrange
        let display = Arc::new(RecordingDisplay::new());
        let (_bus, view) = view_with(&display);
        view.queue_message(DeliveryEntry::new("lab1", "first"));
        view.wait_idle().await;

        // Act
        view.queue_message(DeliveryEntry::new("lab1", "second"));
        view.wait_idle().await;

        // Assert
        assert_eq!(display.message_bodies(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_wait_idle_returns_immediately_when_nothing_is_queued() {
        let display = Arc::new(RecordingDisplay::new());
        let (_bus, view) = view_with(&display);

        view.wait_idle().await;

        assert!(display.records().is_empty());
    }

    #[test]
    fn test_queue_without_runtime_keeps_entry_for_later() {
        let display = Arc::new(RecordingDisplay::new());
        let (_bus, view) = view_with(&display);

        view.queue_message(DeliveryEntry::new("lab1", "held"));

        assert_eq!(view.queued(), 1);
        assert!(!view.is_displaying());
    }

    #[tokio::test]
    async fn test_set_generating_updates_display_and_bus() {
        // Arrange
        let display = Arc::new(RecordingDisplay::new());
        let (bus, view) = view_with(&display);
        let recorder = EventRecorder::attach(&bus, &[names::NPC_GENERATING]);

        // Act
        view.set_generating(Some("lab1"), true);

        // Assert
        assert_eq!(
            recorder.payloads(names::NPC_GENERATING),
            vec![serde_json::json!({ "npcId": "lab1", "active": true })]
        );
        assert_eq!(
            display.records(),
            vec![termshell_test_support::DisplayRecord::Indicator {
                npc_id: Some("lab1".into()),
                active: true,
            }]
        );
    }
}
