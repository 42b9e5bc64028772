//! Termshell Core — the coordination substrate.
//!
//! This crate defines the publish/subscribe event bus, the lazy service
//! locator, the shared error type and the traits every external collaborator
//! (display, storage, lorebook backend, reply producer) is injected through.
//! It contains no terminal or file I/O.

pub mod clock;
pub mod display;
pub mod error;
pub mod event;
pub mod event_bus;
pub mod lorebook;
pub mod reply;
pub mod service_locator;
pub mod storage;
