//! Shared helpers for shell integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use termshell_app::config::ShellConfig;
use termshell_app::context::{Collaborators, ShellContext};
use termshell_core::reply::ReplyProducer;
use termshell_core::storage::KeyValueStore;
use termshell_test_support::{FixedClock, MemoryStore, RecordingDisplay};

pub const DISPLAY_DELAY: Duration = Duration::from_millis(1500);
pub const BOOT_DELAY: Duration = Duration::from_millis(500);

/// A wired shell plus handles on its test doubles.
pub struct TestShell {
    pub context: ShellContext,
    pub display: Arc<RecordingDisplay>,
    pub store: Arc<MemoryStore>,
}

pub fn test_config() -> ShellConfig {
    ShellConfig {
        display_delay: DISPLAY_DELAY,
        boot_delay: BOOT_DELAY,
        ..ShellConfig::default()
    }
}

/// Builds the shell the same way `main` does, with in-memory collaborators
/// and a fixed clock.
pub fn build_shell(producer: Arc<dyn ReplyProducer>) -> TestShell {
    let display = Arc::new(RecordingDisplay::new());
    let store = Arc::new(MemoryStore::new());
    let context = ShellContext::build(
        test_config(),
        Collaborators {
            store: Arc::clone(&store) as Arc<dyn KeyValueStore>,
            producer,
            display: Arc::clone(&display) as _,
            clock: Arc::new(FixedClock::reference()),
        },
    )
    .unwrap();
    TestShell {
        context,
        display,
        store,
    }
}

/// Lets spawned tasks (command handling, model initialization) run.
pub async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}
