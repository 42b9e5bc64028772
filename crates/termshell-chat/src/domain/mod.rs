//! Domain types for the chat context.

pub mod commands;
pub mod events;
pub mod framing;
pub mod interaction;
