//! The terminal front end: a line display and the read-eval loop.

use std::io::{Stdout, Write};
use std::sync::{Mutex, MutexGuard, PoisonError};

use termshell_chat::domain::commands::TerminalCommand;
use termshell_core::display::ChatDisplay;
use termshell_core::error::ShellError;
use termshell_core::event::names;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, warn};

use crate::context::ShellContext;
use crate::error::AppError;

const HELP: [&str; 5] = [
    "message <npc_id> <text>   talk to an NPC (alias: msg)",
    "rerun                     regenerate the last reply",
    "status                    show the power state",
    "help                      show this list",
    "shutdown                  power off and quit (alias: exit)",
];

/// A [`ChatDisplay`] writing plain lines to any writer.
#[derive(Debug)]
pub struct TerminalDisplay<W> {
    out: Mutex<W>,
}

impl TerminalDisplay<Stdout> {
    /// A display on standard output.
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> TerminalDisplay<W> {
    /// A display writing to `out`.
    #[must_use]
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    /// Returns the writer.
    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn out(&self) -> MutexGuard<'_, W> {
        self.out.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_lines<'a>(&self, lines: impl IntoIterator<Item = &'a str>) {
        let mut out = self.out();
        let result = lines
            .into_iter()
            .try_for_each(|line| writeln!(out, "{line}"))
            .and_then(|()| out.flush());
        if let Err(err) = result {
            warn!(error = %err, "terminal write failed");
        }
    }
}

impl<W: Write + Send> ChatDisplay for TerminalDisplay<W> {
    fn print_lines(&self, lines: &[String]) {
        self.write_lines(lines.iter().map(String::as_str));
    }

    fn print_system(&self, text: &str) {
        self.write_lines([format!("[system] {text}").as_str()]);
    }

    fn print_error(&self, text: &str) {
        self.write_lines([format!("[error] {text}").as_str()]);
    }

    fn set_indicator(&self, npc_id: Option<&str>, active: bool) {
        if !active {
            return;
        }
        let line = match npc_id {
            Some(npc_id) => format!("... {npc_id} is typing"),
            None => "... working".to_owned(),
        };
        self.write_lines([line.as_str()]);
    }
}

/// What the loop should do after a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplAction {
    /// Read the next line.
    Continue,
    /// Stop reading and power off.
    Exit,
}

/// Handles one input line.
///
/// Shell builtins (`status`, `help`, `shutdown`/`exit`) are answered here;
/// everything else is published as `terminalCommand` for the subsystems.
///
/// # Errors
///
/// Returns `ShellError::InvalidPayload` if the command cannot be encoded.
pub fn handle_line(context: &ShellContext, line: &str) -> Result<ReplAction, ShellError> {
    let command = line.trim();
    match command.to_ascii_lowercase().as_str() {
        "" => {}
        "status" => {
            let state = context.system().snapshot();
            context.display().print_system(&format!(
                "power: {} | operational: {} | test mode: {}",
                state.state,
                state.is_operational(),
                state.is_test_mode
            ));
        }
        "help" => {
            for entry in HELP {
                context.display().print_system(entry);
            }
        }
        "shutdown" | "exit" => return Ok(ReplAction::Exit),
        _ => {
            let handlers = context.bus().publish(
                names::TERMINAL_COMMAND,
                &TerminalCommand {
                    command: command.to_owned(),
                },
            )?;
            debug!(command, handlers, "terminal command emitted");
        }
    }
    Ok(ReplAction::Continue)
}

/// Reads commands from `input` until end of input or `shutdown`, then powers
/// off and waits for pending replies and queued chat output.
///
/// # Errors
///
/// Returns `AppError::Io` if reading fails and `AppError::Shell` if an event
/// cannot be published.
pub async fn run_repl<R>(context: &ShellContext, input: R) -> Result<(), AppError>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        if handle_line(context, &line)? == ReplAction::Exit {
            break;
        }
        // Give spawned chat work a chance to start before the next line.
        tokio::task::yield_now().await;
    }
    context.shutdown().await?;
    Ok(())
}
