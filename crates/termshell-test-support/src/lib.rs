//! Shared test mocks and utilities for the Termshell game shell.

mod bus;
mod clock;
mod display;
mod lorebook;
mod reply;
mod storage;

pub use bus::EventRecorder;
pub use clock::FixedClock;
pub use display::{DisplayRecord, RecordingDisplay};
pub use lorebook::{FailingLorebook, RecordingLorebook};
pub use reply::{FailingReplyProducer, ProducerCall, ScriptedReplyProducer};
pub use storage::MemoryStore;
