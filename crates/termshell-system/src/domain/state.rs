//! Power state machine.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::events::SystemStateChange;

/// Operational state of the shell.
///
/// The canonical cycle is `PoweredOff → PoweringOn → PoweredOn →
/// PoweringOff → PoweredOff`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PowerState {
    /// Off; no input accepted.
    #[default]
    PoweredOff,
    /// Boot sequence running.
    PoweringOn,
    /// Fully up.
    PoweredOn,
    /// Shutdown sequence running.
    PoweringOff,
}

impl PowerState {
    /// The state that canonically follows this one.
    #[must_use]
    pub fn successor(self) -> Self {
        match self {
            Self::PoweredOff => Self::PoweringOn,
            Self::PoweringOn => Self::PoweredOn,
            Self::PoweredOn => Self::PoweringOff,
            Self::PoweringOff => Self::PoweredOff,
        }
    }

    /// Whether the shell is on its way down or already off.
    #[must_use]
    pub fn is_shutting_down(self) -> bool {
        matches!(self, Self::PoweringOff | Self::PoweredOff)
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::PoweredOff => "POWERED_OFF",
            Self::PoweringOn => "POWERING_ON",
            Self::PoweredOn => "POWERED_ON",
            Self::PoweringOff => "POWERING_OFF",
        };
        f.write_str(label)
    }
}

/// Snapshot of the mirrored system state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemState {
    /// Current power state.
    pub state: PowerState,
    /// Raw power flag.
    pub is_powered: bool,
    /// Whether the shell runs in test mode.
    pub is_test_mode: bool,
}

impl SystemState {
    /// True only when powered and fully up. Transitional states reject input
    /// even though the power flag may already be set.
    #[must_use]
    pub fn is_operational(&self) -> bool {
        self.is_powered && self.state == PowerState::PoweredOn
    }

    /// Applies a `systemStateChange`. Returns `false` when the new state is
    /// not the canonical successor of the current one; the change is applied
    /// regardless.
    pub fn apply_state_change(&mut self, change: &SystemStateChange) -> bool {
        let canonical = change.state == self.state || change.state == self.state.successor();
        self.state = change.state;
        self.is_powered = change.is_on;
        if let Some(test_mode) = change.test_mode {
            self.is_test_mode = test_mode;
        }
        canonical
    }

    /// Applies a `systemPowerChange`; only the power flag moves.
    pub fn apply_power_change(&mut self, is_on: bool) {
        self.is_powered = is_on;
    }
}
