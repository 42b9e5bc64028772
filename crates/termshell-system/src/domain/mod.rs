//! Domain types for the system context.

pub mod events;
pub mod state;
