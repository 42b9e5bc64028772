//! Power sequencing.
//!
//! The system service only mirrors power events, so something has to emit
//! them; at the terminal that is the shell itself.

use std::time::Duration;

use termshell_core::error::ShellError;
use termshell_core::event::names;
use termshell_core::event_bus::EventBus;
use termshell_system::PowerState;
use termshell_system::domain::events::SystemStateChange;
use tracing::info;

/// Emits `POWERING_ON`, flips the power flag, waits `delay`, then emits
/// `POWERED_ON`.
///
/// # Errors
///
/// Returns `ShellError::InvalidPayload` if an event cannot be encoded.
pub async fn power_on(bus: &EventBus, delay: Duration, test_mode: bool) -> Result<(), ShellError> {
    info!(test_mode, "powering on");
    bus.publish(
        names::SYSTEM_STATE_CHANGE,
        &SystemStateChange::new(PowerState::PoweringOn, true).with_test_mode(test_mode),
    )?;
    bus.publish(names::SYSTEM_POWER_CHANGE, &true)?;
    tokio::time::sleep(delay).await;
    bus.publish(
        names::SYSTEM_STATE_CHANGE,
        &SystemStateChange::new(PowerState::PoweredOn, true),
    )?;
    info!("powered on");
    Ok(())
}

/// Emits `POWERING_OFF`, waits `delay`, emits `POWERED_OFF` and clears the
/// power flag.
///
/// # Errors
///
/// Returns `ShellError::InvalidPayload` if an event cannot be encoded.
pub async fn power_off(bus: &EventBus, delay: Duration) -> Result<(), ShellError> {
    info!("powering off");
    bus.publish(
        names::SYSTEM_STATE_CHANGE,
        &SystemStateChange::new(PowerState::PoweringOff, false),
    )?;
    tokio::time::sleep(delay).await;
    bus.publish(
        names::SYSTEM_STATE_CHANGE,
        &SystemStateChange::new(PowerState::PoweredOff, false),
    )?;
    bus.publish(names::SYSTEM_POWER_CHANGE, &false)?;
    info!("powered off");
    Ok(())
}
