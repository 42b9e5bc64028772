//! Termshell — system power state.
//!
//! Mirrors the shell's power state machine from `systemStateChange` and
//! `systemPowerChange` events and answers whether user input may be
//! accepted.

pub mod application;
pub mod domain;

pub use application::service::SystemService;
pub use domain::state::{PowerState, SystemState};
