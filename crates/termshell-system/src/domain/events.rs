//! Inbound event payloads for the system context.

use serde::{Deserialize, Serialize};

use super::state::PowerState;

/// Payload of `systemStateChange`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStateChange {
    /// Target state.
    pub state: PowerState,
    /// Power flag after the transition.
    pub is_on: bool,
    /// Test-mode flag; absent keeps the current value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_mode: Option<bool>,
}

impl SystemStateChange {
    /// A transition to `state` with the given power flag.
    #[must_use]
    pub fn new(state: PowerState, is_on: bool) -> Self {
        Self {
            state,
            is_on,
            test_mode: None,
        }
    }

    /// Sets the test-mode flag carried by this transition.
    #[must_use]
    pub fn with_test_mode(mut self, test_mode: bool) -> Self {
        self.test_mode = Some(test_mode);
        self
    }
}
