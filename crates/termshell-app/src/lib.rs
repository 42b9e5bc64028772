//! Termshell — terminal front end.
//!
//! Reads the configuration, wires the subsystems through a service locator,
//! sequences power and runs the command loop.

pub mod boot;
pub mod config;
pub mod context;
pub mod error;
pub mod lorebook_store;
pub mod npc_directory;
pub mod storage;
pub mod terminal;
