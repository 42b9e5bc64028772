//! The system service: a pure mirror of power-state events.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use termshell_core::event::{Payload, decode, names};
use termshell_core::event_bus::{EventBus, HandlerResult};
use tracing::{debug, info};

use crate::domain::events::SystemStateChange;
use crate::domain::state::{PowerState, SystemState};

const NAMESPACE: &str = "system";

/// Tracks the shell's power state.
///
/// The service never originates a transition; it only applies what arrives
/// on the bus. Anything that must refuse input while the shell is booting or
/// shutting down asks [`is_operational`](Self::is_operational).
#[derive(Debug)]
pub struct SystemService {
    bus: EventBus,
    state: Mutex<SystemState>,
}

impl SystemService {
    /// Creates a detached service in the powered-off state.
    #[must_use]
    pub fn new(bus: EventBus) -> Arc<Self> {
        Arc::new(Self {
            bus,
            state: Mutex::new(SystemState::default()),
        })
    }

    /// Subscribes to `systemStateChange` and `systemPowerChange`.
    ///
    /// Handlers hold a weak reference, so dropping the last `Arc` turns them
    /// into no-ops.
    pub fn attach(self: &Arc<Self>) {
        let service = Arc::downgrade(self);
        self.bus.on(
            &format!("{}.{NAMESPACE}", names::SYSTEM_STATE_CHANGE),
            move |payload| with_service(&service, |s| s.handle_state_change(payload)),
        );
        let service = Arc::downgrade(self);
        self.bus.on(
            &format!("{}.{NAMESPACE}", names::SYSTEM_POWER_CHANGE),
            move |payload| with_service(&service, |s| s.handle_power_change(payload)),
        );
        debug!("system service attached");
    }

    /// Removes this service's bus handlers.
    pub fn detach(&self) {
        self.bus.off(&format!(".{NAMESPACE}"), None);
    }

    fn state(&self) -> MutexGuard<'_, SystemState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn handle_state_change(&self, payload: &Payload) -> HandlerResult {
        let change: SystemStateChange = decode(names::SYSTEM_STATE_CHANGE, payload)?;
        let (previous, canonical) = {
            let mut state = self.state();
            let previous = state.state;
            (previous, state.apply_state_change(&change))
        };
        if !canonical {
            debug!(from = %previous, to = %change.state, "non-sequential power transition");
        }
        info!(state = %change.state, is_on = change.is_on, "system state changed");
        Ok(())
    }

    fn handle_power_change(&self, payload: &Payload) -> HandlerResult {
        let is_on: bool = decode(names::SYSTEM_POWER_CHANGE, payload)?;
        self.state().apply_power_change(is_on);
        info!(is_on, "system power changed");
        Ok(())
    }

    /// Copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> SystemState {
        *self.state()
    }

    /// Current power state.
    #[must_use]
    pub fn power_state(&self) -> PowerState {
        self.state().state
    }

    /// Raw power flag.
    #[must_use]
    pub fn is_powered(&self) -> bool {
        self.state().is_powered
    }

    /// Whether the shell runs in test mode.
    #[must_use]
    pub fn is_test_mode(&self) -> bool {
        self.state().is_test_mode
    }

    /// Whether user input may be accepted right now.
    #[must_use]
    pub fn is_operational(&self) -> bool {
        self.state().is_operational()
    }
}

fn with_service(
    service: &Weak<SystemService>,
    f: impl FnOnce(&SystemService) -> HandlerResult,
) -> HandlerResult {
    match service.upgrade() {
        Some(service) => f(&service),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use termshell_core::error::ShellError;

    fn attached() -> (EventBus, Arc<SystemService>) {
        let bus = EventBus::new();
        let service = SystemService::new(bus.clone());
        service.attach();
        (bus, service)
    }

    fn emit_state(bus: &EventBus, state: PowerState, is_on: bool) {
        bus.publish(
            names::SYSTEM_STATE_CHANGE,
            &SystemStateChange::new(state, is_on),
        )
        .unwrap();
    }

    #[test]
    fn test_state_change_events_drive_the_mirror() {
        // Arrange
        let (bus, service) = attached();

        // Act
        emit_state(&bus, PowerState::PoweringOn, true);
        let booting = service.is_operational();
        emit_state(&bus, PowerState::PoweredOn, true);

        // Assert
        assert!(!booting);
        assert!(service.is_operational());
        assert_eq!(service.power_state(), PowerState::PoweredOn);
    }

    #[test]
    fn test_power_change_event_sets_flag_only() {
        // Arrange
        let (bus, service) = attached();

        // Act
        bus.emit(names::SYSTEM_POWER_CHANGE, &json!(true));

        // Assert
        assert!(service.is_powered());
        assert_eq!(service.power_state(), PowerState::PoweredOff);
        assert!(!service.is_operational());
    }

    #[test]
    fn test_test_mode_flag_is_mirrored() {
        let (bus, service) = attached();

        bus.emit(
            names::SYSTEM_STATE_CHANGE,
            &json!({ "state": "POWERING_ON", "isOn": true, "testMode": true }),
        );

        assert!(service.is_test_mode());
    }

    #[test]
    fn test_malformed_payload_leaves_state_untouched() {
        // Arrange
        let (bus, service) = attached();
        emit_state(&bus, PowerState::PoweringOn, true);

        // Act
        let invoked = bus.emit(names::SYSTEM_STATE_CHANGE, &json!({ "state": "EXPLODED" }));

        // Assert
        assert_eq!(invoked, 1);
        assert_eq!(service.power_state(), PowerState::PoweringOn);
    }

    #[test]
    fn test_handlers_report_decode_failures() {
        let (_bus, service) = attached();

        let result = service.handle_power_change(&json!("yes"));

        assert!(matches!(result, Err(ShellError::InvalidPayload { .. })));
    }

    #[test]
    fn test_detach_stops_mirroring() {
        // Arrange
        let (bus, service) = attached();

        // Act
        service.detach();
        emit_state(&bus, PowerState::PoweringOn, true);

        // Assert
        assert_eq!(service.power_state(), PowerState::PoweredOff);
        assert_eq!(bus.listener_count(None), 0);
    }

    #[test]
    fn test_dropped_service_handlers_become_noops() {
        // Arrange
        let (bus, service) = attached();
        drop(service);

        // Act
        let invoked = bus.emit(names::SYSTEM_POWER_CHANGE, &json!(true));

        // Assert
        assert_eq!(invoked, 1);
    }
}
