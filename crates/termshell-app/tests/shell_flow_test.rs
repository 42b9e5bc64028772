//! End-to-end tests through the wired shell context.

mod common;

use std::sync::Arc;

use termshell_app::lorebook_store::StoredLorebook;
use termshell_app::npc_directory::NpcDirectory;
use termshell_app::terminal::{self, ReplAction};
use termshell_chat::application::controller::NOT_OPERATIONAL;
use termshell_chat::application::model::LOREBOOK_ID_KEY;
use termshell_core::lorebook::LorebookBackend;
use termshell_core::storage::KeyValueStore;
use termshell_system::PowerState;
use termshell_test_support::ScriptedReplyProducer;

use common::{DISPLAY_DELAY, build_shell, settle};

#[tokio::test(start_paused = true)]
async fn test_boot_makes_shell_operational_and_loads_chat_memory() {
    // Arrange
    let shell = build_shell(Arc::new(ScriptedReplyProducer::new()));

    // Act
    shell.context.boot().await.unwrap();
    settle().await;

    // Assert
    assert!(shell.context.system().is_operational());
    assert_eq!(shell.context.system().power_state(), PowerState::PoweredOn);
    assert!(shell.context.chat_model().unwrap().is_ready());
    assert!(shell.store.has(LOREBOOK_ID_KEY));
}

#[tokio::test(start_paused = true)]
async fn test_message_command_is_delivered_and_remembered() {
    // Arrange
    let shell = build_shell(Arc::new(ScriptedReplyProducer::new().reply("lab1", "Hi")));
    shell.context.boot().await.unwrap();
    settle().await;

    // Act
    let action = terminal::handle_line(&shell.context, "message lab1 hello").unwrap();
    settle().await;
    shell.context.chat_view().wait_idle().await;

    // Assert
    assert_eq!(action, ReplAction::Continue);
    assert_eq!(shell.display.message_bodies(), vec!["Hi"]);
    let lorebook = StoredLorebook::new(Arc::clone(&shell.store) as Arc<dyn KeyValueStore>);
    let id = lorebook.get_or_create_chat_lorebook(None).await.unwrap();
    let entries = lorebook.get_lorebook_entries(&id).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].content, "user: hello\nlab1: Hi");
}

#[tokio::test(start_paused = true)]
async fn test_repl_session_delivers_replies_in_order_then_powers_off() {
    // Arrange
    let shell = build_shell(Arc::new(
        ScriptedReplyProducer::new()
            .reply("lab1", "first")
            .reply("guard", "second"),
    ));
    shell.context.boot().await.unwrap();
    let input: &[u8] = b"msg lab1 hi\nmsg guard hey there\nstatus\nexit\nmsg lab1 ignored\n";

    // Act
    terminal::run_repl(&shell.context, input).await.unwrap();

    // Assert
    assert_eq!(shell.display.message_bodies(), vec!["first", "second"]);
    let instants: Vec<_> = shell.display.messages().into_iter().map(|(_, at)| at).collect();
    assert_eq!(instants[1] - instants[0], DISPLAY_DELAY);
    assert_eq!(
        shell.display.system_lines(),
        vec!["power: POWERED_ON | operational: true | test mode: false"]
    );
    assert_eq!(shell.context.system().power_state(), PowerState::PoweredOff);
    assert!(!shell.context.chat_view().is_displaying());
}

#[tokio::test(start_paused = true)]
async fn test_commands_before_boot_are_rejected() {
    let shell = build_shell(Arc::new(ScriptedReplyProducer::new().reply("lab1", "Hi")));

    terminal::handle_line(&shell.context, "message lab1 hello").unwrap();
    settle().await;

    assert_eq!(shell.display.system_lines(), vec![NOT_OPERATIONAL]);
    assert!(shell.display.messages().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_unknown_npc_from_builtin_roster_shows_error() {
    // Arrange
    let shell = build_shell(Arc::new(NpcDirectory::builtin().unwrap()));
    shell.context.boot().await.unwrap();

    // Act
    terminal::handle_line(&shell.context, "msg ghost boo").unwrap();
    settle().await;

    // Assert
    let errors = shell.display.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("ghost"));
    assert!(shell.display.messages().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_rerun_before_any_message_prints_system_line() {
    // Arrange
    let shell = build_shell(Arc::new(NpcDirectory::builtin().unwrap()));
    shell.context.boot().await.unwrap();

    // Act
    terminal::handle_line(&shell.context, "rerun").unwrap();
    settle().await;

    // Assert
    assert_eq!(
        shell.display.system_lines(),
        vec![termshell_app::npc_directory::NOTHING_TO_RERUN]
    );
}

#[tokio::test(start_paused = true)]
async fn test_usage_error_for_short_message() {
    let shell = build_shell(Arc::new(ScriptedReplyProducer::new()));
    shell.context.boot().await.unwrap();

    terminal::handle_line(&shell.context, "message lab1").unwrap();

    assert_eq!(
        shell.display.errors(),
        vec!["validation error: usage: message <npc_id> <text>"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_rejects_further_commands() {
    // Arrange
    let shell = build_shell(Arc::new(ScriptedReplyProducer::new().reply("lab1", "Hi")));
    shell.context.boot().await.unwrap();
    shell.context.shutdown().await.unwrap();

    // Act
    terminal::handle_line(&shell.context, "message lab1 hello").unwrap();
    settle().await;

    // Assert
    assert!(!shell.context.system().is_operational());
    assert_eq!(shell.display.system_lines(), vec![NOT_OPERATIONAL]);
}

#[tokio::test(start_paused = true)]
async fn test_piped_session_waits_for_slow_reply_before_exit() {
    // Arrange
    let shell = build_shell(Arc::new(NpcDirectory::builtin().unwrap()));
    shell.context.boot().await.unwrap();
    let input: &[u8] = b"msg oracle hello\n";

    // Act
    terminal::run_repl(&shell.context, input).await.unwrap();

    // Assert
    assert_eq!(
        shell.display.message_bodies(),
        vec!["The answer to \"hello\" is written in the static."]
    );
    assert_eq!(shell.context.chat_controller().in_flight(), 0);
    assert_eq!(shell.context.system().power_state(), PowerState::PoweredOff);
    assert!(!shell.context.chat_view().is_displaying());
}
