//! Event recorder — captures what a bus emits.

use std::sync::{Arc, Mutex};

use termshell_core::event::Payload;
use termshell_core::event_bus::EventBus;

/// Subscribes to a set of events and keeps every emission in order.
#[derive(Debug, Clone, Default)]
pub struct EventRecorder {
    seen: Arc<Mutex<Vec<(String, Payload)>>>,
}

impl EventRecorder {
    /// Starts recording `events` on `bus`.
    #[must_use]
    pub fn attach(bus: &EventBus, events: &[&str]) -> Self {
        let recorder = Self::default();
        for event in events {
            let seen = Arc::clone(&recorder.seen);
            let name = (*event).to_owned();
            bus.on(&format!("{event}.recorder"), move |payload| {
                seen.lock().unwrap().push((name.clone(), payload.clone()));
                Ok(())
            });
        }
        recorder
    }

    /// Every recorded `(event, payload)` pair.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn events(&self) -> Vec<(String, Payload)> {
        self.seen.lock().unwrap().clone()
    }

    /// Recorded payloads of one event.
    #[must_use]
    pub fn payloads(&self, event: &str) -> Vec<Payload> {
        self.events()
            .into_iter()
            .filter(|(name, _)| name == event)
            .map(|(_, payload)| payload)
            .collect()
    }

    /// How many times `event` was recorded.
    #[must_use]
    pub fn count(&self, event: &str) -> usize {
        self.payloads(event).len()
    }
}
